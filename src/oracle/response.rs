//! Oracle response decoding
//!
//! Two stages with separate failure kinds:
//! 1. Textual extraction: strip code fences and surrounding prose, find
//!    brace-balanced `{...}` candidates. None found is `ResponseExtraction`.
//! 2. Structural decoding: repair smart quotes, non-breaking spaces and
//!    single-quoted strings, then decode as a JSON object. The first candidate
//!    that decodes wins; if none does, the first candidate's error is
//!    reported as `ResponseDecode`.
//!
//! Shape validation of the decoded object (string values, vocabulary
//! membership) belongs to the resolution policy, not here.

use crate::error::{CanonError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

/// Untyped oracle answer: whatever object the response contained.
pub type OracleAnswer = Map<String, Value>;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"```[A-Za-z]*").expect("valid fence pattern");
}

const PREVIEW_LEN: usize = 200;

pub fn decode_answer(text: &str) -> Result<OracleAnswer> {
    let cleaned = CODE_FENCE.replace_all(text, "");
    let candidates = extract_objects(&cleaned);

    if candidates.is_empty() {
        return Err(CanonError::ResponseExtraction(preview(text)));
    }

    let mut first_error = None;
    for candidate in &candidates {
        match decode_object(candidate) {
            Ok(answer) => return Ok(answer),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or_else(|| CanonError::ResponseDecode(preview(text))))
}

/// Every brace-balanced object in `text`, in order of their opening brace.
/// Falls back to the greedy first-`{`-to-last-`}` span when nothing balances.
fn extract_objects(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();

    for (start, c) in chars.iter().enumerate() {
        if *c != '{' {
            continue;
        }
        if let Some(end) = balanced_end(&chars, start) {
            out.push(chars[start..=end].iter().collect());
        }
    }

    if out.is_empty() {
        let first = chars.iter().position(|c| *c == '{');
        let last = chars.iter().rposition(|c| *c == '}');
        if let (Some(first), Some(last)) = (first, last) {
            if first < last {
                out.push(chars[first..=last].iter().collect());
            }
        }
    }

    out
}

#[derive(Clone, Copy, PartialEq)]
enum QuoteClass {
    Double,
    Single,
}

fn quote_class(c: char) -> Option<QuoteClass> {
    match c {
        '"' | '\u{201C}' | '\u{201D}' => Some(QuoteClass::Double),
        '\'' | '\u{2018}' | '\u{2019}' => Some(QuoteClass::Single),
        _ => None,
    }
}

/// Index of the brace closing the one at `start`, skipping quoted text.
fn balanced_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string: Option<QuoteClass> = None;
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        match in_string {
            Some(class) => {
                if c == '\\' {
                    i += 1;
                } else if quote_class(c) == Some(class) {
                    in_string = None;
                }
            }
            None => match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => in_string = quote_class(c),
            },
        }
        i += 1;
    }
    None
}

fn decode_object(candidate: &str) -> Result<OracleAnswer> {
    let repaired = normalize_quotes(candidate);

    match serde_json::from_str::<OracleAnswer>(&repaired) {
        Ok(answer) => Ok(answer),
        Err(first) => {
            let requoted = requote_single_quoted(&repaired);
            serde_json::from_str::<OracleAnswer>(&requoted)
                .map_err(|_| CanonError::ResponseDecode(format!("{} in {}", first, preview(candidate))))
        }
    }
}

/// Smart quotes to ASCII, non-breaking spaces to spaces.
fn normalize_quotes(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect()
}

/// Rewrite single-quoted strings as double-quoted JSON strings. Double-quoted
/// strings pass through untouched, so apostrophes inside them survive.
fn requote_single_quoted(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_string: Option<QuoteClass> = None;

    while let Some(c) = chars.next() {
        match in_string {
            None => match c {
                '"' => {
                    in_string = Some(QuoteClass::Double);
                    out.push('"');
                }
                '\'' => {
                    in_string = Some(QuoteClass::Single);
                    out.push('"');
                }
                other => out.push(other),
            },
            Some(QuoteClass::Double) => {
                out.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if c == '"' {
                    in_string = None;
                }
            }
            Some(QuoteClass::Single) => match c {
                '\\' => match chars.next() {
                    Some('\'') => out.push('\''),
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => out.push('\\'),
                },
                '"' => out.push_str("\\\""),
                '\'' => {
                    in_string = None;
                    out.push('"');
                }
                other => out.push(other),
            },
        }
    }
    out
}

fn preview(text: &str) -> String {
    let mut s: String = text.chars().take(PREVIEW_LEN).collect();
    if text.chars().count() > PREVIEW_LEN {
        s.push_str("...");
    }
    s
}
