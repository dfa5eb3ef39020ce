//! Whitespace and punctuation canonicalization.
//!
//! Runs of whitespace collapse to one space, no space precedes `. , ; : ! ?`,
//! and exactly one space follows each of them. E-mail addresses, URLs and digit
//! groups (`3.5`, `10:30`, `01/2020`) are left intact so later regex rules still
//! see them. `normalize(normalize(x)) == normalize(x)` for every input.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static SPACE_BEFORE_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.,;:!?])").expect("valid regex"));

/// Tokens whose internal punctuation must not be spaced out.
static PROTECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
          [A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}   # e-mail
        | (?:https?://|www\.)\S+                           # url
        | \d+(?:[.,:/-]\d+)+                               # digit groups
        ",
    )
    .expect("valid regex")
});

fn is_punctuation(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?')
}

/// Normalizes a whole text into a single line.
pub fn normalize(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text.trim(), " ");
    let tightened = SPACE_BEFORE_PUNCTUATION.replace_all(&collapsed, "$1");
    space_after_punctuation(&tightened)
}

/// Normalizes each line independently and keeps line boundaries, dropping
/// lines that end up empty. Label rules in field extraction need this form.
pub fn normalize_lines<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(|line| normalize(line.as_ref()))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn space_after_punctuation(text: &str) -> String {
    let protected: Vec<Range<usize>> = PROTECTED.find_iter(text).map(|m| m.range()).collect();
    let is_protected = |idx: usize| protected.iter().any(|r| r.contains(&idx));

    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        out.push(c);
        if !is_punctuation(c) || is_protected(idx) {
            continue;
        }
        if let Some(&(_, next)) = chars.peek() {
            if !next.is_whitespace() && !is_punctuation(next) {
                out.push(' ');
            }
        }
    }

    out
}
