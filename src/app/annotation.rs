use super::navigation::{compute_targets, NavigationEngine, NavigationTarget};
use crate::diff::FileDiff;
use crate::review::{CommentTag, NewComment, ReviewComment, ReviewRequest};
use std::collections::{HashMap, HashSet};

/// Draft comment anchored to a new-side line range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerState {
    pub file_path: String,
    pub line_start: usize,
    pub line_end: Option<usize>,
    pub body: String,
    pub tag: Option<CommentTag>,
}

/// Mark and composer state for one diff view. Comments themselves live
/// elsewhere; this only turns user gestures into requests.
#[derive(Debug, Default)]
pub struct AnnotationSession {
    mark: Option<NavigationTarget>,
    composer: Option<ComposerState>,
}

impl AnnotationSession {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mark ──

    pub fn mark(&self) -> Option<NavigationTarget> {
        self.mark
    }

    /// Anchor a range at the cursor. Only diff lines can be marked.
    pub fn set_mark(&mut self, nav: &NavigationEngine) -> bool {
        match nav.current_target() {
            Some(target @ NavigationTarget::Line { .. }) => {
                self.mark = Some(target);
                true
            }
            _ => false,
        }
    }

    pub fn clear_mark(&mut self) {
        self.mark = None;
    }

    // ── Composer ──

    pub fn composer(&self) -> Option<&ComposerState> {
        self.composer.as_ref()
    }

    pub fn is_composing(&self) -> bool {
        self.composer.is_some()
    }

    /// Open the composer on the cursor line, or on the mark..cursor range when
    /// a mark is set. A mark in another file is dropped without opening.
    pub fn open_composer(&mut self, nav: &NavigationEngine) -> bool {
        let Some(NavigationTarget::Line { file, hunk, line }) = nav.current_target() else {
            return false;
        };
        let Some(diff) = nav.files().get(file) else {
            return false;
        };

        let anchor = match self.mark.take() {
            Some(NavigationTarget::Line {
                file: mark_file,
                hunk: mark_hunk,
                line: mark_line,
            }) => {
                if mark_file != file || diff.line(mark_hunk, mark_line).is_none() {
                    tracing::debug!(mark_file, cursor_file = file, "dropping mark outside cursor file");
                    return false;
                }
                range_anchor(diff, (mark_hunk, mark_line), (hunk, line))
            }
            _ => diff
                .line(hunk, line)
                .and_then(|l| l.new_num)
                .map(|n| (n, None)),
        };

        let Some((line_start, line_end)) = anchor else {
            return false;
        };
        self.composer = Some(ComposerState {
            file_path: diff.path().to_string(),
            line_start,
            line_end,
            body: String::new(),
            tag: None,
        });
        true
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        if let Some(composer) = self.composer.as_mut() {
            composer.body = body.into();
        }
    }

    pub fn set_tag(&mut self, tag: Option<CommentTag>) {
        if let Some(composer) = self.composer.as_mut() {
            composer.tag = tag;
        }
    }

    pub fn cancel(&mut self) {
        self.composer = None;
    }

    /// Turn the draft into a create request. A blank body keeps the composer open.
    pub fn submit(&mut self) -> Option<ReviewRequest> {
        let body = self.composer.as_ref()?.body.trim().to_string();
        if body.is_empty() {
            return None;
        }
        let composer = self.composer.take()?;
        Some(ReviewRequest::CreateComment(NewComment {
            file_path: composer.file_path,
            line_start: composer.line_start,
            line_end: composer.line_end,
            body,
            tag: composer.tag,
        }))
    }
}

/// New-side (start, end) of the lines between two positions of one file, in
/// document order regardless of which came first. `end` is `None` for a
/// single line.
fn range_anchor(
    file: &FileDiff,
    a: (usize, usize),
    b: (usize, usize),
) -> Option<(usize, Option<usize>)> {
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    let mut numbers = file
        .hunks
        .iter()
        .enumerate()
        .take(end.0 + 1)
        .skip(start.0)
        .flat_map(|(hunk_idx, hunk)| {
            let first = if hunk_idx == start.0 { start.1 } else { 0 };
            let last = if hunk_idx == end.0 { end.1 + 1 } else { hunk.lines.len() };
            hunk.lines
                .get(first..last.min(hunk.lines.len()))
                .unwrap_or_default()
                .iter()
        })
        .filter_map(|l| l.new_num);

    let line_start = numbers.next()?;
    let line_end = numbers.last().filter(|&n| n != line_start);
    Some((line_start, line_end))
}

// ── Comment views ──

/// Request flipping a comment between open and resolved
pub fn toggle_resolved(comments: &[ReviewComment], id: &str) -> Option<ReviewRequest> {
    let comment = comments.iter().find(|c| c.id == id)?;
    Some(ReviewRequest::SetCommentStatus {
        id: comment.id.clone(),
        status: comment.status.toggled(),
    })
}

/// Comment count per file path
pub fn comment_counts_by_file(comments: &[ReviewComment]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for comment in comments {
        *counts.entry(comment.file_path.clone()).or_insert(0) += 1;
    }
    counts
}

/// New-side lines of `file` that fall inside some comment on it. Only lines
/// present in the diff are reported, whatever range a comment claims.
pub fn commented_lines(comments: &[ReviewComment], file: &FileDiff) -> HashSet<usize> {
    let on_file: Vec<&ReviewComment> = comments.iter().filter(|c| c.file_path == file.path()).collect();
    if on_file.is_empty() {
        return HashSet::new();
    }
    file.hunks
        .iter()
        .flat_map(|h| h.lines.iter())
        .filter_map(|l| l.new_num)
        .filter(|&n| on_file.iter().any(|c| c.covers(n)))
        .collect()
}

/// Move to the next (or previous) line that starts an open comment, scanning
/// every line regardless of collapse state and wrapping around.
pub fn jump_to_unresolved(nav: &mut NavigationEngine, comments: &[ReviewComment], forward: bool) -> bool {
    let starts: HashSet<(&str, usize)> = comments
        .iter()
        .filter(|c| c.is_open())
        .map(|c| (c.file_path.as_str(), c.line_start))
        .collect();
    if starts.is_empty() {
        return false;
    }

    let files = nav.files();
    let order = compute_targets(files, &HashSet::new(), &HashSet::new());
    if order.is_empty() {
        return false;
    }
    let from = nav
        .current_target()
        .and_then(|t| order.iter().position(|o| *o == t))
        .unwrap_or(0);

    let is_match = |target: &NavigationTarget| -> bool {
        let NavigationTarget::Line { file, hunk, line } = *target else {
            return false;
        };
        let Some(diff) = files.get(file) else {
            return false;
        };
        diff.line(hunk, line)
            .and_then(|l| l.new_num)
            .map(|n| starts.contains(&(diff.path(), n)))
            .unwrap_or(false)
    };

    let len = order.len();
    let found = (1..=len)
        .map(|step| if forward { (from + step) % len } else { (from + len - step % len) % len })
        .map(|idx| order[idx])
        .find(|t| is_match(t));

    match found {
        Some(target) => nav.focus(target),
        None => false,
    }
}
