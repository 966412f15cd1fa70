//! Intraline highlighting for isolated removed/added line pairs.

use super::unified::{DiffHunk, LineType};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Changed byte ranges on each side of a line pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineDiff {
    pub old_ranges: Vec<Range<usize>>,
    pub new_ranges: Vec<Range<usize>>,
}

impl InlineDiff {
    pub fn is_empty(&self) -> bool {
        self.old_ranges.is_empty() && self.new_ranges.is_empty()
    }
}

/// An isolated 1:1 replacement inside a hunk, by line index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlinePair {
    pub removed_idx: usize,
    pub added_idx: usize,
    pub diff: InlineDiff,
}

/// Strip the common prefix and suffix; what remains on each side changed.
/// Ranges are byte offsets on char boundaries. Identical inputs give no ranges.
pub fn inline_diff(old: &str, new: &str) -> InlineDiff {
    if old == new {
        return InlineDiff::default();
    }

    let prefix: usize = old
        .chars()
        .zip(new.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();

    let old_rest = &old[prefix..];
    let new_rest = &new[prefix..];
    let suffix: usize = old_rest
        .chars()
        .rev()
        .zip(new_rest.chars().rev())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();

    let old_span = prefix..old.len() - suffix;
    let new_span = prefix..new.len() - suffix;

    InlineDiff {
        old_ranges: non_empty(old_span),
        new_ranges: non_empty(new_span),
    }
}

fn non_empty(range: Range<usize>) -> Vec<Range<usize>> {
    if range.is_empty() {
        Vec::new()
    } else {
        vec![range]
    }
}

/// Every removed line directly followed by an added line, where the pair is
/// not part of a larger replacement block.
pub fn inline_pairs(hunk: &DiffHunk) -> Vec<InlinePair> {
    let lines = &hunk.lines;
    let mut pairs = Vec::new();
    for idx in 0..lines.len().saturating_sub(1) {
        if lines[idx].line_type != LineType::Removed || lines[idx + 1].line_type != LineType::Added {
            continue;
        }
        let removed_before = idx > 0 && lines[idx - 1].line_type == LineType::Removed;
        let added_after = lines
            .get(idx + 2)
            .map(|l| l.line_type == LineType::Added)
            .unwrap_or(false);
        if removed_before || added_after {
            continue;
        }
        pairs.push(InlinePair {
            removed_idx: idx,
            added_idx: idx + 1,
            diff: inline_diff(&lines[idx].content, &lines[idx + 1].content),
        });
    }
    pairs
}
