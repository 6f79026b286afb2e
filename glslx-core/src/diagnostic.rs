//! Non-fatal semantic diagnostics.

use std::fmt;

use crate::span::Range;

/// A problem found while analyzing a file, anchored to a byte range.
///
/// Diagnostics never stop analysis; a file with diagnostics still yields a
/// usable AST and scope tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Diagnostic {
    pub start: usize,
    pub end: usize,
    pub why: String,
}

impl Diagnostic {
    pub fn new(range: Range, why: impl Into<String>) -> Self {
        Diagnostic {
            start: range.start,
            end: range.end,
            why: why.into(),
        }
    }

    pub fn range(&self) -> Range {
        Range::new(self.start, self.end)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}: {}", self.start, self.end, self.why)
    }
}

/// Drop exact duplicates while keeping first-seen order.
pub fn dedup(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut seen = std::collections::HashSet::new();
    diagnostics
        .into_iter()
        .filter(|diagnostic| seen.insert(diagnostic.clone()))
        .collect()
}
