//! Candidate location: fenced code blocks and brace-balanced substrings

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("fence regex compiles")
});

/// Contents of every triple-backtick block, in order of appearance.
/// Language tags are ignored.
pub(crate) fn fenced_blocks(text: &str) -> Vec<&str> {
    FENCE_RE
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|group| group.as_str())
        .collect()
}

/// Balanced `open ... close` substrings at nesting depth zero, in
/// order of appearance. Delimiters inside double-quoted strings are
/// ignored; unterminated candidates are dropped.
pub(crate) fn delimited_candidates(text: &str, open: char, close: char) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' && depth > 0 {
            in_string = true;
        } else if c == open {
            if depth == 0 {
                start = i;
            }
            depth += 1;
        } else if c == close && depth > 0 {
            depth -= 1;
            if depth == 0 {
                candidates.push(&text[start..i + close.len_utf8()]);
            }
        }
    }
    candidates
}
