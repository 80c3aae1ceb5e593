//! Text repair passes applied before strict JSON parsing
//!
//! Each pass is string-aware: characters inside double-quoted strings
//! are never treated as syntax.

/// Markers that begin a trailing diagnostic dump appended after the
/// payload (stack traces, logged exceptions).
const ERROR_MARKERS: &[&str] = &[
    "\nTraceback (most recent call last)",
    "\nError:",
    "\nERROR:",
    "\nerror:",
    "\nException",
    "\nFATAL",
    "\npanicked at",
];

/// Cut a trailing fatal-error-looking suffix.
///
/// Only text after the first closing delimiter is ever cut, so a
/// payload that happens to follow an apologetic "Error: ..." preamble
/// survives intact.
pub(crate) fn strip_error_suffix(text: &str) -> &str {
    let Some(first_close) = text.find(['}', ']']) else {
        return text;
    };

    let mut cut = text.len();
    for marker in ERROR_MARKERS {
        let mut search_from = 0;
        while let Some(rel) = text[search_from..].find(marker) {
            let pos = search_from + rel;
            if pos > first_close {
                cut = cut.min(pos);
                break;
            }
            search_from = pos + marker.len();
        }
    }
    &text[..cut]
}

/// Remove `//` line comments and `/* */ ` block comments outside
/// strings.
pub(crate) fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }
        if c == '/' && i + 1 < chars.len() {
            match chars[i + 1] {
                '/' => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    continue;
                }
                '*' => {
                    i += 2;
                    while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                        i += 1;
                    }
                    i = (i + 2).min(chars.len());
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Local cleanup: drop control characters, repair doubled inner
/// quotes, and remove trailing commas. Applied before a strict parse.
pub(crate) fn clean(text: &str) -> String {
    let stripped = strip_control_chars(text);
    let quoted = escape_doubled_quotes(&stripped);
    remove_trailing_commas(&quoted)
}

fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// Repair CSV-style doubled quotes inside string values: `""` becomes
/// `\"` unless both neighbours are structural, in which case it is a
/// genuine empty-string literal.
fn escape_doubled_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '"' && i + 1 < chars.len() && chars[i + 1] == '"' {
            let prev = chars[..i].iter().rev().find(|c| !c.is_whitespace());
            let next = chars[i + 2..].iter().find(|c| !c.is_whitespace());
            let prev_structural = matches!(prev, None | Some(':' | ',' | '[' | '{'));
            let next_structural = matches!(next, None | Some(':' | ',' | ']' | '}'));
            if prev_structural && next_structural {
                out.push('"');
                out.push('"');
            } else {
                out.push('\\');
                out.push('"');
            }
            i += 2;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if !(j < chars.len() && matches!(chars[j], '}' | ']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}
