//! Combines the line output of several recognition backends into one text.
//!
//! Backends routinely re-recognize the same visual line, so lines are trimmed
//! and deduplicated on exact content. Near-duplicates are left alone.

use std::collections::HashSet;

/// Unique, trimmed, non-blank lines. First-seen order is kept for
/// determinism, but callers must not rely on cross-backend ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedText {
    lines: Vec<String>,
}

impl MergedText {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Lines joined with `\n` for downstream processing.
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

/// Merges zero or more backend outputs. An entry may itself contain embedded
/// newlines; it is split before deduplication.
pub fn merge_outputs<S: AsRef<str>>(outputs: &[Vec<S>]) -> MergedText {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut lines = Vec::new();

    for output in outputs {
        for line in output.iter().flat_map(|entry| entry.as_ref().lines()) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if seen.insert(line) {
                lines.push(line.to_string());
            }
        }
    }

    MergedText { lines }
}
