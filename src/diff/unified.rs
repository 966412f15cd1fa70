use super::status::ChangeType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Stable identifier of a file across re-parses (derived from its path)
pub type FileId = String;

const DEV_NULL: &str = "/dev/null";

/// A single line in a diff hunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub line_type: LineType,
    pub content: String,
    pub old_num: Option<usize>,
    pub new_num: Option<usize>,
    pub prefix: char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    Added,
    Removed,
    Context,
}

impl LineType {
    pub fn prefix(&self) -> char {
        match self {
            LineType::Added => '+',
            LineType::Removed => '-',
            LineType::Context => ' ',
        }
    }
}

impl DiffLine {
    fn new(line_type: LineType, content: &str, old_num: Option<usize>, new_num: Option<usize>) -> Self {
        DiffLine {
            line_type,
            content: content.to_string(),
            old_num,
            new_num,
            prefix: line_type.prefix(),
        }
    }

    /// Lines without a new-side number (removed lines) cannot carry comments
    pub fn is_commentable(&self) -> bool {
        self.new_num.is_some()
    }
}

/// A diff hunk with header and lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// Positional index within the file
    pub id: usize,
    pub header: String,
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Format this hunk back into unified diff text
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        text.push_str(&self.header);
        text.push('\n');
        for line in &self.lines {
            text.push(line.prefix);
            text.push_str(&line.content);
            text.push('\n');
        }
        text
    }

    /// Same header and body, ignoring the positional id
    fn same_content(&self, other: &DiffHunk) -> bool {
        self.header == other.header && self.lines == other.lines
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
}

/// A file with its diff hunks and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub id: FileId,
    pub old_path: String,
    pub new_path: String,
    pub change_type: ChangeType,
    pub stats: DiffStats,
    pub hunks: Vec<DiffHunk>,
}

impl FileDiff {
    /// Path shown to the user: the new path, or the old one for deletions
    pub fn path(&self) -> &str {
        if self.change_type == ChangeType::Deleted || self.new_path == DEV_NULL {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    /// File extension of the display path, if any
    pub fn extension(&self) -> Option<&str> {
        path_extension(self.path())
    }

    /// Locate the line carrying new-side number `line_num` as (hunk, line) indices
    pub fn find_new_line(&self, line_num: usize) -> Option<(usize, usize)> {
        self.hunks.iter().enumerate().find_map(|(hunk_idx, hunk)| {
            hunk.lines
                .iter()
                .position(|l| l.new_num == Some(line_num))
                .map(|line_idx| (hunk_idx, line_idx))
        })
    }

    pub fn line(&self, hunk_idx: usize, line_idx: usize) -> Option<&DiffLine> {
        self.hunks.get(hunk_idx)?.lines.get(line_idx)
    }

    fn recompute_stats(&mut self) {
        let mut stats = DiffStats::default();
        for line in self.hunks.iter().flat_map(|h| h.lines.iter()) {
            match line.line_type {
                LineType::Added => stats.additions += 1,
                LineType::Removed => stats.deletions += 1,
                LineType::Context => {}
            }
        }
        self.stats = stats;
    }

    fn renumber_hunks(&mut self) {
        self.hunks.sort_by_key(|h| h.old_start);
        for (idx, hunk) in self.hunks.iter_mut().enumerate() {
            hunk.id = idx;
        }
    }
}

/// Extension of a path's final component ("src/app.ts" -> "ts")
pub fn path_extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Stable id for a file path: first 16 hex chars of its SHA-256
pub fn file_id(path: &str) -> FileId {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Parse unified diff text (possibly several concatenated diffs) into files,
/// in order of first appearance. Never fails; unrecognised lines are skipped.
pub fn parse_diff(raw: &str) -> Vec<FileDiff> {
    let lines: Vec<&str> = raw.lines().collect();
    let mut parser = Parser::default();
    for (idx, line) in lines.iter().enumerate() {
        parser.feed(line, lines.get(idx + 1).copied());
    }
    let files = parser.finish();
    tracing::debug!(files = files.len(), bytes = raw.len(), "parsed diff");
    files
}

// ── Parser state ──

#[derive(Default)]
struct PendingFile {
    old_path: Option<String>,
    new_path: Option<String>,
    change_type: Option<ChangeType>,
    /// Set once `--- ` has been seen for this section
    saw_minus_header: bool,
    hunks: Vec<DiffHunk>,
}

struct OpenHunk {
    hunk: DiffHunk,
    old_line: usize,
    new_line: usize,
    old_remaining: usize,
    new_remaining: usize,
}

impl OpenHunk {
    fn exhausted(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }

    fn push(&mut self, line_type: LineType, content: &str) {
        let line = match line_type {
            LineType::Added => {
                let line = DiffLine::new(line_type, content, None, Some(self.new_line));
                self.new_line = self.new_line.saturating_add(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
                line
            }
            LineType::Removed => {
                let line = DiffLine::new(line_type, content, Some(self.old_line), None);
                self.old_line = self.old_line.saturating_add(1);
                self.old_remaining = self.old_remaining.saturating_sub(1);
                line
            }
            LineType::Context => {
                let line = DiffLine::new(line_type, content, Some(self.old_line), Some(self.new_line));
                self.old_line = self.old_line.saturating_add(1);
                self.new_line = self.new_line.saturating_add(1);
                self.old_remaining = self.old_remaining.saturating_sub(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
                line
            }
        };
        self.hunk.lines.push(line);
    }
}

#[derive(Default)]
struct Parser {
    files: Vec<FileDiff>,
    by_path: HashMap<String, usize>,
    current_file: Option<PendingFile>,
    current_hunk: Option<OpenHunk>,
}

impl Parser {
    fn feed(&mut self, line: &str, next: Option<&str>) {
        // File and hunk boundaries win even inside a hunk whose counts are not yet consumed
        if let Some(rest) = line.strip_prefix("diff --git ") {
            self.start_file();
            let (old, new) = parse_diff_git_paths(rest);
            if let Some(file) = self.current_file.as_mut() {
                file.old_path = old;
                file.new_path = new;
            }
            return;
        }

        if line.starts_with("@@") {
            self.close_hunk();
            match parse_hunk_header(line) {
                Some(hunk) => {
                    if self.current_file.is_none() {
                        tracing::warn!(header = line, "hunk without file header, skipping");
                        return;
                    }
                    self.current_hunk = Some(OpenHunk {
                        old_line: hunk.old_start,
                        new_line: hunk.new_start,
                        old_remaining: hunk.old_count,
                        new_remaining: hunk.new_count,
                        hunk,
                    });
                }
                None => tracing::warn!(header = line, "malformed hunk header, skipping"),
            }
            return;
        }

        let in_body = self
            .current_hunk
            .as_ref()
            .map(|h| !h.exhausted())
            .unwrap_or(false);

        if in_body {
            self.feed_body_line(line);
            return;
        }

        // Between hunks / before the first hunk: file header territory
        if line.starts_with("--- ") && next.map(|n| n.starts_with("+++ ")).unwrap_or(false) {
            let needs_new_file = match &self.current_file {
                Some(file) => file.saw_minus_header || !file.hunks.is_empty() || self.current_hunk.is_some(),
                None => true,
            };
            if needs_new_file {
                self.start_file();
            }
            if let Some(file) = self.current_file.as_mut() {
                file.saw_minus_header = true;
                file.old_path = Some(parse_header_path(&line[4..]));
            }
            return;
        }
        if let Some(rest) = line.strip_prefix("+++ ") {
            if let Some(file) = self.current_file.as_mut() {
                if file.saw_minus_header && file.hunks.is_empty() && self.current_hunk.is_none() {
                    file.new_path = Some(parse_header_path(rest));
                    return;
                }
            }
        }

        if let Some(file) = self.current_file.as_mut() {
            if file.hunks.is_empty() && self.current_hunk.is_none() {
                if line.starts_with("new file mode") {
                    file.change_type = Some(ChangeType::Added);
                    return;
                }
                if line.starts_with("deleted file mode") {
                    file.change_type = Some(ChangeType::Deleted);
                    return;
                }
                if let Some(old) = line.strip_prefix("rename from ") {
                    file.old_path = Some(old.trim_end().to_string());
                    file.change_type = Some(ChangeType::Renamed);
                    return;
                }
                if let Some(new) = line.strip_prefix("rename to ") {
                    file.new_path = Some(new.trim_end().to_string());
                    file.change_type = Some(ChangeType::Renamed);
                    return;
                }
            }
        }

        // Lines past the declared counts are still taken when they look like diff lines
        if self.current_hunk.is_some() && matches!(line.chars().next(), Some('+' | '-' | ' ')) {
            self.feed_body_line(line);
        }
    }

    fn feed_body_line(&mut self, line: &str) {
        let Some(hunk) = self.current_hunk.as_mut() else {
            return;
        };
        let mut chars = line.chars();
        match chars.next() {
            Some('+') => hunk.push(LineType::Added, chars.as_str()),
            Some('-') => hunk.push(LineType::Removed, chars.as_str()),
            Some(' ') => hunk.push(LineType::Context, chars.as_str()),
            // "\ No newline at end of file"
            Some('\\') => {}
            None => hunk.push(LineType::Context, ""),
            Some(_) => hunk.push(LineType::Context, line),
        }
    }

    fn close_hunk(&mut self) {
        if let Some(open) = self.current_hunk.take() {
            if let Some(file) = self.current_file.as_mut() {
                file.hunks.push(open.hunk);
            }
        }
    }

    fn start_file(&mut self) {
        self.close_file();
        self.current_file = Some(PendingFile::default());
    }

    fn close_file(&mut self) {
        self.close_hunk();
        let Some(pending) = self.current_file.take() else {
            return;
        };
        let old_path = pending.old_path.unwrap_or_default();
        let new_path = pending.new_path.unwrap_or_default();
        if old_path.is_empty() && new_path.is_empty() {
            return;
        }
        let old_path = if old_path.is_empty() { new_path.clone() } else { old_path };
        let new_path = if new_path.is_empty() { old_path.clone() } else { new_path };

        let change_type = if old_path == DEV_NULL {
            ChangeType::Added
        } else if new_path == DEV_NULL {
            ChangeType::Deleted
        } else if let Some(kind) = pending.change_type {
            kind
        } else if old_path != new_path {
            ChangeType::Renamed
        } else {
            ChangeType::Modified
        };

        let mut file = FileDiff {
            id: String::new(),
            old_path,
            new_path,
            change_type,
            stats: DiffStats::default(),
            hunks: pending.hunks,
        };
        let path = file.path().to_string();
        file.id = file_id(&path);
        self.merge(path, file);
    }

    /// Repeated paths (concatenated per-turn diffs) fold into their first appearance
    fn merge(&mut self, path: String, mut file: FileDiff) {
        match self.by_path.get(&path).copied() {
            Some(idx) => {
                let existing = &mut self.files[idx];
                for hunk in file.hunks.drain(..) {
                    if !existing.hunks.iter().any(|h| h.same_content(&hunk)) {
                        existing.hunks.push(hunk);
                    }
                }
                if file.change_type == ChangeType::Deleted {
                    existing.change_type = ChangeType::Deleted;
                }
                existing.renumber_hunks();
                existing.recompute_stats();
            }
            None => {
                file.renumber_hunks();
                file.recompute_stats();
                self.by_path.insert(path, self.files.len());
                self.files.push(file);
            }
        }
    }

    fn finish(mut self) -> Vec<FileDiff> {
        self.close_file();
        self.files
    }
}

/// Extract paths from the remainder of "diff --git a/path b/path"
fn parse_diff_git_paths(rest: &str) -> (Option<String>, Option<String>) {
    match rest.split_once(" b/") {
        Some((old, new)) => {
            let old = old.strip_prefix("a/").unwrap_or(old);
            (Some(old.to_string()), Some(new.trim_end().to_string()))
        }
        None => {
            let path = rest.trim_end().to_string();
            (Some(path.clone()), Some(path))
        }
    }
}

/// Path from a `--- `/`+++ ` header: drops a trailing timestamp and the a/ b/ prefix
fn parse_header_path(rest: &str) -> String {
    let path = rest.split('\t').next().unwrap_or(rest).trim_end();
    if path == DEV_NULL {
        return path.to_string();
    }
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

/// Parse a hunk header like "@@ -10,4 +10,15 @@ fn foo()"
fn parse_hunk_header(line: &str) -> Option<DiffHunk> {
    let after_first = line.strip_prefix("@@ ")?;
    let end_idx = after_first.find(" @@")?;
    let range_str = &after_first[..end_idx];

    let parts: Vec<&str> = range_str.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }

    let (old_start, old_count) = parse_range(parts[0].strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(parts[1].strip_prefix('+')?)?;

    Some(DiffHunk {
        id: 0,
        header: line.to_string(),
        old_start,
        old_count,
        new_start,
        new_count,
        lines: Vec::new(),
    })
}

/// Parse "start,count" or just "start" (count defaults to 1)
fn parse_range(s: &str) -> Option<(usize, usize)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        Some((s.parse().ok()?, 1))
    }
}
