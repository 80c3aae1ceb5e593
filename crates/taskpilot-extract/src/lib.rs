//! taskpilot-extract - Structured data recovery from model output
//!
//! The oracle is a natural-language generator: the structured payload
//! usually arrives wrapped in prose, markdown fences, trailing
//! diagnostics, comments, or with minor syntax damage (trailing commas,
//! doubled quotes). This crate recovers a JSON object or array from
//! such text through a fixed cascade of locate-then-repair strategies,
//! and fails loudly rather than accept garbage.
//!
//! Extraction is a pure function of the input text: the same input
//! always yields the same value or the same failure.

mod cleanup;
mod scan;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// Every strategy at every stage failed. Carries the original text
    /// for diagnostics.
    #[error("no structured data in model output ({} bytes)", .text.len())]
    NoStructuredData { text: String },
}

/// What the caller expects at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Object,
    Array,
}

impl Shape {
    fn open(self) -> char {
        match self {
            Self::Object => '{',
            Self::Array => '[',
        }
    }

    fn close(self) -> char {
        match self {
            Self::Object => '}',
            Self::Array => ']',
        }
    }

    /// A structurally valid result is only accepted when its shape is
    /// plausible: a non-empty object, or any sequence.
    fn plausible(self, value: &Value) -> bool {
        match self {
            Self::Object => value.as_object().is_some_and(|map| !map.is_empty()),
            Self::Array => value.is_array(),
        }
    }
}

/// Extract a JSON object from arbitrary model output.
pub fn extract_object(text: &str) -> Result<Value, ExtractError> {
    extract(text, Shape::Object)
}

/// Extract a JSON array from arbitrary model output (plan generation).
pub fn extract_array(text: &str) -> Result<Value, ExtractError> {
    extract(text, Shape::Array)
}

fn extract(raw: &str, shape: Shape) -> Result<Value, ExtractError> {
    let text = cleanup::strip_error_suffix(raw).trim();

    // Stage 1: fenced code blocks, candidates in order of appearance.
    for block in scan::fenced_blocks(text) {
        for candidate in scan::delimited_candidates(block, shape.open(), shape.close()) {
            if let Some(value) = try_strategies(candidate, shape) {
                return Ok(value);
            }
        }
    }

    // Stage 2: balanced substrings anywhere in the text, longest (most
    // complete) first.
    let mut candidates = scan::delimited_candidates(text, shape.open(), shape.close());
    candidates.sort_by_key(|candidate| std::cmp::Reverse(candidate.len()));
    for candidate in candidates {
        if let Some(value) = try_strategies(candidate, shape) {
            return Ok(value);
        }
    }

    // Stage 3: last resort, the span from the first opening to the
    // last closing delimiter.
    if let (Some(start), Some(end)) = (text.find(shape.open()), text.rfind(shape.close())) {
        if start < end {
            if let Some(value) = try_strategies(&text[start..=end], shape) {
                return Ok(value);
            }
        }
    }

    log::debug!(
        "extraction exhausted all strategies on {} bytes of input",
        raw.len()
    );
    Err(ExtractError::NoStructuredData {
        text: raw.to_string(),
    })
}

/// The four parse strategies, cheapest repair first. The first
/// structurally valid, plausible value wins.
fn try_strategies(candidate: &str, shape: Shape) -> Option<Value> {
    let attempts = [
        candidate.to_string(),
        cleanup::strip_comments(candidate),
        cleanup::clean(candidate),
        cleanup::clean(&cleanup::strip_comments(candidate)),
    ];

    for attempt in &attempts {
        if let Ok(value) = serde_json::from_str::<Value>(attempt) {
            if shape.plausible(&value) {
                return Some(value);
            }
        }
    }
    None
}
