use super::collapse::CollapseRules;
use crate::diff::{FileDiff, FileId};
use serde::Serialize;
use std::collections::HashSet;

/// One focusable row of the flattened diff, by position in the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NavigationTarget {
    FileHeader { file: usize },
    HunkHeader { file: usize, hunk: usize },
    Line { file: usize, hunk: usize, line: usize },
}

impl NavigationTarget {
    pub fn file(&self) -> usize {
        match *self {
            NavigationTarget::FileHeader { file }
            | NavigationTarget::HunkHeader { file, .. }
            | NavigationTarget::Line { file, .. } => file,
        }
    }

    pub fn hunk(&self) -> Option<usize> {
        match *self {
            NavigationTarget::FileHeader { .. } => None,
            NavigationTarget::HunkHeader { hunk, .. } | NavigationTarget::Line { hunk, .. } => Some(hunk),
        }
    }

    pub fn is_header(&self) -> bool {
        !matches!(self, NavigationTarget::Line { .. })
    }
}

/// Document order: file header, then (unless the file is collapsed) each hunk
/// header, then (unless the hunk is collapsed) each of its lines.
pub fn compute_targets(
    files: &[FileDiff],
    collapsed_files: &HashSet<FileId>,
    collapsed_hunks: &HashSet<(usize, usize)>,
) -> Vec<NavigationTarget> {
    let mut targets = Vec::new();
    for (file_idx, file) in files.iter().enumerate() {
        targets.push(NavigationTarget::FileHeader { file: file_idx });
        if collapsed_files.contains(&file.id) {
            continue;
        }
        for (hunk_idx, hunk) in file.hunks.iter().enumerate() {
            targets.push(NavigationTarget::HunkHeader {
                file: file_idx,
                hunk: hunk_idx,
            });
            if collapsed_hunks.contains(&(file_idx, hunk_idx)) {
                continue;
            }
            targets.extend((0..hunk.lines.len()).map(|line_idx| NavigationTarget::Line {
                file: file_idx,
                hunk: hunk_idx,
                line: line_idx,
            }));
        }
    }
    targets
}

/// Request to show a file (by id or path) and optionally a new-side line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub target: String,
    pub line: Option<usize>,
}

impl NavigationRequest {
    pub fn new(target: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            target: target.into(),
            line,
        }
    }
}

/// Collapse-aware cursor over a diff model.
///
/// The cursor is re-clamped whenever the model or collapse state changes, so
/// `cursor()` and `current_target()` always refer to the current target list.
#[derive(Debug, Default)]
pub struct NavigationEngine {
    files: Vec<FileDiff>,
    targets: Vec<NavigationTarget>,
    collapsed_files: HashSet<FileId>,
    collapsed_hunks: HashSet<(usize, usize)>,
    cursor: usize,
    following: bool,
    session_active: bool,
    pending_request: Option<NavigationRequest>,
    collapse_rules: CollapseRules,
    /// Files already offered to the auto-collapse rules
    seen_files: HashSet<FileId>,
}

impl NavigationEngine {
    pub fn new(following: bool) -> Self {
        Self {
            following,
            session_active: true,
            ..Default::default()
        }
    }

    pub fn with_collapse_rules(mut self, rules: CollapseRules) -> Self {
        self.collapse_rules = rules;
        self
    }

    // ── Model ──

    /// Replace the diff model (always a full re-parse, never a patch)
    pub fn set_files(&mut self, files: Vec<FileDiff>) {
        let previous_count = self.files.len();
        let previous_target = self.current_target();
        self.files = files;

        for file in &self.files {
            if self.seen_files.insert(file.id.clone()) && self.collapse_rules.matches(file.path()) {
                self.collapsed_files.insert(file.id.clone());
            }
        }

        self.rebuild();
        if let Some(idx) = previous_target.and_then(|t| self.index_of(&t)) {
            self.cursor = idx;
        }

        if self.following && self.session_active && self.files.len() > previous_count {
            tracing::debug!(files = self.files.len(), "follow: new file streamed in");
            self.snap_to_last_file();
        }

        if !self.files.is_empty() {
            self.apply_pending_navigation();
        }
    }

    pub fn files(&self) -> &[FileDiff] {
        &self.files
    }

    pub fn targets(&self) -> &[NavigationTarget] {
        &self.targets
    }

    pub fn cursor(&self) -> usize {
        self.cursor.min(self.targets.len().saturating_sub(1))
    }

    pub fn current_target(&self) -> Option<NavigationTarget> {
        self.targets.get(self.cursor()).copied()
    }

    pub fn current_file(&self) -> Option<&FileDiff> {
        self.current_target().and_then(|t| self.files.get(t.file()))
    }

    fn rebuild(&mut self) {
        self.targets = compute_targets(&self.files, &self.collapsed_files, &self.collapsed_hunks);
        self.cursor = self.cursor();
    }

    fn index_of(&self, target: &NavigationTarget) -> Option<usize> {
        self.targets.iter().position(|t| t == target)
    }

    fn target_exists(&self, target: &NavigationTarget) -> bool {
        let Some(file) = self.files.get(target.file()) else {
            return false;
        };
        match *target {
            NavigationTarget::FileHeader { .. } => true,
            NavigationTarget::HunkHeader { hunk, .. } => hunk < file.hunks.len(),
            NavigationTarget::Line { hunk, line, .. } => file.line(hunk, line).is_some(),
        }
    }

    // ── Cursor ──

    pub fn move_cursor(&mut self, delta: isize) {
        self.following = false;
        if self.targets.is_empty() {
            return;
        }
        let last = self.targets.len() - 1;
        self.cursor = self.cursor().saturating_add_signed(delta).min(last);
    }

    /// Move to the next/previous file or hunk header. Backwards from a line
    /// first lands on that line's own header; only a second press reaches the
    /// previous section.
    pub fn jump_section(&mut self, forward: bool) {
        self.following = false;
        let cur = self.cursor();
        let found = if forward {
            self.targets
                .iter()
                .skip(cur + 1)
                .position(NavigationTarget::is_header)
                .map(|offset| cur + 1 + offset)
        } else {
            self.targets[..cur.min(self.targets.len())]
                .iter()
                .rposition(NavigationTarget::is_header)
        };
        if let Some(idx) = found {
            self.cursor = idx;
        }
    }

    // ── Collapse ──

    pub fn is_file_collapsed(&self, file_idx: usize) -> bool {
        self.files
            .get(file_idx)
            .map(|f| self.collapsed_files.contains(&f.id))
            .unwrap_or(false)
    }

    pub fn is_hunk_collapsed(&self, file_idx: usize, hunk_idx: usize) -> bool {
        self.collapsed_hunks.contains(&(file_idx, hunk_idx))
    }

    /// Flip collapse of the target's file (file header) or hunk (hunk header or
    /// line) and put the cursor on the toggled header. Unknown targets are ignored.
    pub fn toggle_collapse(&mut self, target: NavigationTarget) -> bool {
        if !self.target_exists(&target) {
            return false;
        }
        self.following = false;

        let header = match target {
            NavigationTarget::FileHeader { file } => {
                let id = self.files[file].id.clone();
                if !self.collapsed_files.remove(&id) {
                    self.collapsed_files.insert(id);
                }
                NavigationTarget::FileHeader { file }
            }
            NavigationTarget::HunkHeader { file, hunk } | NavigationTarget::Line { file, hunk, .. } => {
                if !self.collapsed_hunks.remove(&(file, hunk)) {
                    self.collapsed_hunks.insert((file, hunk));
                }
                NavigationTarget::HunkHeader { file, hunk }
            }
        };

        self.rebuild();
        let fallback = NavigationTarget::FileHeader { file: header.file() };
        if let Some(idx) = self.index_of(&header).or_else(|| self.index_of(&fallback)) {
            self.cursor = idx;
        }
        true
    }

    pub fn toggle_collapse_at_cursor(&mut self) -> bool {
        match self.current_target() {
            Some(target) => self.toggle_collapse(target),
            None => false,
        }
    }

    /// Expand every collapsed ancestor of `target` so it becomes visible
    pub(crate) fn expand_to(&mut self, target: &NavigationTarget) {
        if let Some(file) = self.files.get(target.file()) {
            self.collapsed_files.remove(&file.id);
        }
        if let NavigationTarget::Line { file, hunk, .. } = *target {
            self.collapsed_hunks.remove(&(file, hunk));
        }
        self.rebuild();
    }

    /// Reveal `target` and put the cursor on it. Disables follow.
    pub fn focus(&mut self, target: NavigationTarget) -> bool {
        if !self.target_exists(&target) {
            return false;
        }
        self.following = false;
        self.expand_to(&target);
        match self.index_of(&target) {
            Some(idx) => {
                self.cursor = idx;
                true
            }
            None => false,
        }
    }

    // ── Follow mode ──

    pub fn is_following(&self) -> bool {
        self.following
    }

    /// Enabling follow snaps to the newest file right away
    pub fn set_following(&mut self, following: bool) {
        self.following = following;
        if following {
            self.snap_to_last_file();
        }
    }

    /// Follow only tracks new files while the session is still producing output
    pub fn set_session_active(&mut self, active: bool) {
        self.session_active = active;
    }

    fn snap_to_last_file(&mut self) {
        if let Some(idx) = self
            .targets
            .iter()
            .rposition(|t| matches!(t, NavigationTarget::FileHeader { .. }))
        {
            self.cursor = idx;
        }
    }

    // ── External navigation ──

    /// Queue a request; it is applied once against the first non-empty model
    /// and then dropped whether or not it matched.
    pub fn request_navigation(&mut self, request: NavigationRequest) -> bool {
        self.pending_request = Some(request);
        if self.files.is_empty() {
            return false;
        }
        self.apply_pending_navigation()
    }

    fn apply_pending_navigation(&mut self) -> bool {
        let Some(request) = self.pending_request.take() else {
            return false;
        };
        let resolved = self.resolve_target(&request);
        tracing::debug!(key = %request.target, line = ?request.line, found = resolved.is_some(), "navigation request");
        match resolved {
            Some(target) => self.focus(target),
            None => false,
        }
    }

    fn resolve_target(&self, request: &NavigationRequest) -> Option<NavigationTarget> {
        let file_idx = find_file(&self.files, &request.target)?;
        let file = &self.files[file_idx];
        let Some(line_num) = request.line else {
            return Some(NavigationTarget::FileHeader { file: file_idx });
        };
        if let Some((hunk, line)) = file.find_new_line(line_num) {
            return Some(NavigationTarget::Line {
                file: file_idx,
                hunk,
                line,
            });
        }
        let containing = file
            .hunks
            .iter()
            .position(|h| line_num >= h.new_start && line_num < h.new_start.saturating_add(h.new_count.max(1)));
        Some(match containing {
            Some(hunk) => NavigationTarget::HunkHeader { file: file_idx, hunk },
            None => NavigationTarget::FileHeader { file: file_idx },
        })
    }
}

/// Match by exact id, exact path, then path suffix (either direction, on a
/// `/` boundary)
pub fn find_file(files: &[FileDiff], key: &str) -> Option<usize> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    files
        .iter()
        .position(|f| f.id == key)
        .or_else(|| files.iter().position(|f| f.path() == key || f.new_path == key))
        .or_else(|| {
            files.iter().position(|f| {
                let path = f.path();
                is_path_suffix(path, key) || is_path_suffix(key, path)
            })
        })
}

fn is_path_suffix(full: &str, suffix: &str) -> bool {
    match full.strip_suffix(suffix) {
        Some(head) => head.is_empty() || head.ends_with('/') || suffix.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parse_diff;

    const TWO_FILES: &str = "diff --git a/src/a.rs b/src/a.rs\n@@ -1,2 +1,2 @@\n x\n-y\n+z\n@@ -10,1 +10,2 @@\n p\n+q\ndiff --git a/src/b.rs b/src/b.rs\n@@ -1 +1 @@\n-m\n+n\n";

    fn make_engine(raw: &str) -> NavigationEngine {
        let mut engine = NavigationEngine::new(false);
        engine.set_files(parse_diff(raw));
        engine
    }

    fn expected_count(engine: &NavigationEngine) -> usize {
        let files = engine.files();
        let mut count = files.len();
        for (f, file) in files.iter().enumerate() {
            if engine.is_file_collapsed(f) {
                continue;
            }
            count += file.hunks.len();
            for (h, hunk) in file.hunks.iter().enumerate() {
                if !engine.is_hunk_collapsed(f, h) {
                    count += hunk.lines.len();
                }
            }
        }
        count
    }

    #[test]
    fn targets_follow_document_order() {
        let engine = make_engine(TWO_FILES);
        let targets = engine.targets();
        assert_eq!(targets[0], NavigationTarget::FileHeader { file: 0 });
        assert_eq!(targets[1], NavigationTarget::HunkHeader { file: 0, hunk: 0 });
        assert_eq!(targets[2], NavigationTarget::Line { file: 0, hunk: 0, line: 0 });
        assert_eq!(targets[5], NavigationTarget::HunkHeader { file: 0, hunk: 1 });
        assert_eq!(targets[8], NavigationTarget::FileHeader { file: 1 });
        assert_eq!(targets.len(), 12);
    }

    #[test]
    fn target_count_matches_collapse_state() {
        let mut engine = make_engine(TWO_FILES);
        assert_eq!(engine.targets().len(), expected_count(&engine));
        engine.toggle_collapse(NavigationTarget::HunkHeader { file: 0, hunk: 1 });
        assert_eq!(engine.targets().len(), expected_count(&engine));
        engine.toggle_collapse(NavigationTarget::FileHeader { file: 1 });
        assert_eq!(engine.targets().len(), expected_count(&engine));
        assert_eq!(engine.targets().len(), 12 - 2 - 3);
    }

    #[test]
    fn empty_model_has_no_targets_and_safe_cursor() {
        let mut engine = make_engine("");
        assert!(engine.targets().is_empty());
        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.current_target(), None);
        engine.move_cursor(3);
        engine.jump_section(false);
        assert!(!engine.toggle_collapse_at_cursor());
    }

    #[test]
    fn move_cursor_clamps_both_ends() {
        let mut engine = make_engine(TWO_FILES);
        engine.move_cursor(-5);
        assert_eq!(engine.cursor(), 0);
        engine.move_cursor(100);
        assert_eq!(engine.cursor(), engine.targets().len() - 1);
    }

    #[test]
    fn jump_section_forward_visits_headers() {
        let mut engine = make_engine(TWO_FILES);
        engine.jump_section(true);
        assert_eq!(engine.current_target(), Some(NavigationTarget::HunkHeader { file: 0, hunk: 0 }));
        engine.jump_section(true);
        assert_eq!(engine.current_target(), Some(NavigationTarget::HunkHeader { file: 0, hunk: 1 }));
        engine.jump_section(true);
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 1 }));
    }

    #[test]
    fn jump_section_back_snaps_to_own_header_first() {
        let mut engine = make_engine(TWO_FILES);
        // Second line of the second hunk
        engine.move_cursor(7);
        assert_eq!(engine.current_target(), Some(NavigationTarget::Line { file: 0, hunk: 1, line: 1 }));
        engine.jump_section(false);
        assert_eq!(engine.current_target(), Some(NavigationTarget::HunkHeader { file: 0, hunk: 1 }));
        engine.jump_section(false);
        assert_eq!(engine.current_target(), Some(NavigationTarget::HunkHeader { file: 0, hunk: 0 }));
        engine.jump_section(false);
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 0 }));
        engine.jump_section(false);
        assert_eq!(engine.cursor(), 0);
    }

    #[test]
    fn collapsing_file_under_cursor_lands_on_its_header() {
        let mut engine = make_engine(TWO_FILES);
        engine.move_cursor(6);
        let target = engine.current_target().unwrap();
        assert_eq!(target.file(), 0);
        assert!(engine.toggle_collapse(NavigationTarget::FileHeader { file: 0 }));
        assert!(engine.cursor() < engine.targets().len());
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 0 }));
    }

    #[test]
    fn toggling_from_a_line_collapses_its_hunk() {
        let mut engine = make_engine(TWO_FILES);
        engine.move_cursor(3);
        assert!(engine.toggle_collapse_at_cursor());
        assert!(engine.is_hunk_collapsed(0, 0));
        assert_eq!(engine.current_target(), Some(NavigationTarget::HunkHeader { file: 0, hunk: 0 }));
        assert!(engine.toggle_collapse_at_cursor());
        assert!(!engine.is_hunk_collapsed(0, 0));
    }

    #[test]
    fn toggling_nonexistent_target_is_noop() {
        let mut engine = make_engine(TWO_FILES);
        let before = engine.targets().len();
        assert!(!engine.toggle_collapse(NavigationTarget::FileHeader { file: 9 }));
        assert!(!engine.toggle_collapse(NavigationTarget::HunkHeader { file: 0, hunk: 9 }));
        assert_eq!(engine.targets().len(), before);
    }

    #[test]
    fn follow_snaps_to_new_files_while_session_active() {
        let mut engine = NavigationEngine::new(true);
        engine.set_files(parse_diff("diff --git a/a b/a\n@@ -1 +1 @@\n-x\n+y\n"));
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 0 }));

        engine.set_files(parse_diff(TWO_FILES));
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 1 }));
    }

    #[test]
    fn follow_ignores_growth_after_session_ends() {
        let mut engine = NavigationEngine::new(true);
        engine.set_files(parse_diff("diff --git a/src/a.rs b/src/a.rs\n@@ -1 +1 @@\n-x\n+y\n"));
        engine.set_session_active(false);
        engine.set_files(parse_diff(TWO_FILES));
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 0 }));
    }

    #[test]
    fn manual_move_disables_follow_and_reenable_resnaps() {
        let mut engine = NavigationEngine::new(true);
        engine.set_files(parse_diff(TWO_FILES));
        engine.move_cursor(-100);
        assert!(!engine.is_following());
        assert_eq!(engine.cursor(), 0);

        engine.set_files(parse_diff(&format!("{TWO_FILES}diff --git a/c b/c\n@@ -1 +1 @@\n-1\n+2\n")));
        assert_eq!(engine.cursor(), 0);

        engine.set_following(true);
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 2 }));
    }

    #[test]
    fn collapse_disables_follow() {
        let mut engine = NavigationEngine::new(true);
        engine.set_files(parse_diff(TWO_FILES));
        engine.toggle_collapse_at_cursor();
        assert!(!engine.is_following());
    }

    #[test]
    fn model_update_keeps_cursor_on_same_target() {
        let mut engine = make_engine(TWO_FILES);
        engine.move_cursor(9);
        let before = engine.current_target();
        engine.set_files(parse_diff(&format!("{TWO_FILES}diff --git a/c b/c\n@@ -1 +1 @@\n-1\n+2\n")));
        assert_eq!(engine.current_target(), before);
    }

    #[test]
    fn model_shrink_reclamps_cursor() {
        let mut engine = make_engine(TWO_FILES);
        engine.move_cursor(100);
        engine.set_files(parse_diff("diff --git a/x b/x\n@@ -1 +1 @@\n-a\n+b\n"));
        assert_eq!(engine.cursor(), engine.targets().len() - 1);
    }

    #[test]
    fn navigation_by_path_and_line_expands_collapsed_ancestors() {
        let mut engine = make_engine(TWO_FILES);
        engine.toggle_collapse(NavigationTarget::HunkHeader { file: 0, hunk: 1 });
        engine.toggle_collapse(NavigationTarget::FileHeader { file: 0 });
        assert!(engine.request_navigation(NavigationRequest::new("src/a.rs", Some(11))));
        assert_eq!(engine.current_target(), Some(NavigationTarget::Line { file: 0, hunk: 1, line: 1 }));
        assert!(!engine.is_file_collapsed(0));
        assert!(!engine.is_hunk_collapsed(0, 1));
    }

    #[test]
    fn navigation_matches_id_and_suffixes() {
        let mut engine = make_engine(TWO_FILES);
        let id = engine.files()[1].id.clone();
        assert!(engine.request_navigation(NavigationRequest::new(id, None)));
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 1 }));

        assert!(engine.request_navigation(NavigationRequest::new("a.rs", None)));
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 0 }));

        assert!(engine.request_navigation(NavigationRequest::new("/repo/src/b.rs", None)));
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 1 }));
    }

    #[test]
    fn suffix_match_requires_path_boundary() {
        let files = parse_diff(TWO_FILES);
        assert_eq!(find_file(&files, "b.rs"), Some(1));
        assert_eq!(find_file(&files, "rc/b.rs"), None);
        assert_eq!(find_file(&files, ""), None);
    }

    #[test]
    fn unmatched_request_is_consumed() {
        let mut engine = make_engine(TWO_FILES);
        engine.move_cursor(4);
        assert!(!engine.request_navigation(NavigationRequest::new("missing.rs", Some(1))));
        assert_eq!(engine.cursor(), 4);
        engine.set_files(parse_diff(TWO_FILES));
        assert_eq!(engine.cursor(), 4);
    }

    #[test]
    fn request_before_model_applies_on_first_files() {
        let mut engine = NavigationEngine::new(false);
        assert!(!engine.request_navigation(NavigationRequest::new("src/b.rs", Some(1))));
        engine.set_files(parse_diff(TWO_FILES));
        assert_eq!(engine.current_target(), Some(NavigationTarget::Line { file: 1, hunk: 0, line: 1 }));
        engine.move_cursor(-100);
        engine.set_files(parse_diff(TWO_FILES));
        assert_eq!(engine.cursor(), 0);
    }

    #[test]
    fn line_outside_any_line_falls_back_to_hunk_or_file() {
        let mut engine = make_engine(TWO_FILES);
        assert!(engine.request_navigation(NavigationRequest::new("src/a.rs", Some(500))));
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 0 }));
    }

    #[test]
    fn navigation_into_hunk_at_end_of_line_range() {
        let mut engine = make_engine("diff --git a/x b/x\n@@ -1 +18446744073709551614,3 @@\n-a\n+b\n+c\n+d\n");
        assert!(engine.request_navigation(NavigationRequest::new("x", Some(usize::MAX - 1))));
        assert_eq!(engine.current_target(), Some(NavigationTarget::Line { file: 0, hunk: 0, line: 1 }));
        assert!(engine.request_navigation(NavigationRequest::new("x", Some(7))));
        assert_eq!(engine.current_target(), Some(NavigationTarget::FileHeader { file: 0 }));
    }

    #[test]
    fn auto_collapse_rules_apply_on_first_appearance_only() {
        let lock = "diff --git a/Cargo.lock b/Cargo.lock\n@@ -1 +1 @@\n-a\n+b\n";
        let mut engine =
            NavigationEngine::new(false).with_collapse_rules(CollapseRules::new(&["*.lock"]));
        engine.set_files(parse_diff(lock));
        assert!(engine.is_file_collapsed(0));
        assert_eq!(engine.targets().len(), 1);

        engine.toggle_collapse(NavigationTarget::FileHeader { file: 0 });
        engine.set_files(parse_diff(lock));
        assert!(!engine.is_file_collapsed(0));
    }
}
