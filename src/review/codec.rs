//! Review message text: comments plus diff context, and the inverse parser
//! used when the same message shows up again in a session transcript.
//!
//! Wire shape:
//!
//! ````text
//! ## Code Review Feedback
//!
//! ### src/a.ts
//!
//! **Lines 3–4** [risk]:
//! ```ts
//! -old
//! +new
//! ```
//! > first body line
//! > second body line
//!
//! <!-- review-comment-ids: c1 -->
//! ````

use super::comment::ReviewComment;
use crate::diff::{DiffLine, FileDiff, LineType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const REVIEW_HEADER: &str = "## Code Review Feedback";
const IDS_TRAILER_OPEN: &str = "<!-- review-comment-ids:";
const IDS_TRAILER_CLOSE: &str = "-->";
const FENCE: &str = "```";

/// Serialized review plus the ids it covers (resolved by the caller once sent)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewMessage {
    pub text: String,
    pub comment_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageOptions {
    /// Emit a fenced block with the commented diff lines
    pub include_code_context: bool,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            include_code_context: true,
        }
    }
}

/// Build the review message for `selection` (explicit ids), or for every open
/// comment when no selection is given. Returns `None` when nothing qualifies.
pub fn serialize_review(
    comments: &[ReviewComment],
    files: &[FileDiff],
    selection: Option<&[String]>,
    options: &MessageOptions,
) -> Option<ReviewMessage> {
    let chosen: Vec<&ReviewComment> = match selection {
        Some(ids) => {
            let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            comments.iter().filter(|c| wanted.contains(c.id.as_str())).collect()
        }
        None => comments.iter().filter(|c| c.is_open()).collect(),
    };
    if chosen.is_empty() {
        return None;
    }

    // Group by file, first appearance order
    let mut groups: Vec<(&str, Vec<&ReviewComment>)> = Vec::new();
    for comment in chosen {
        match groups.iter_mut().find(|(path, _)| *path == comment.file_path) {
            Some((_, group)) => group.push(comment),
            None => groups.push((comment.file_path.as_str(), vec![comment])),
        }
    }

    let mut out: Vec<String> = vec![REVIEW_HEADER.to_string()];
    let mut ids = Vec::new();
    for (path, mut group) in groups {
        group.sort_by_key(|c| c.line_start);
        let file = files.iter().find(|f| matches_path(f, path));

        out.push(String::new());
        out.push(format!("### {path}"));
        for comment in group {
            out.push(String::new());
            out.push(match comment.tag {
                Some(tag) => format!("**{}** [{}]:", comment.line_ref(), tag.as_str()),
                None => format!("**{}**:", comment.line_ref()),
            });

            if options.include_code_context {
                if let Some(file) = file {
                    let lines = context_lines(file, comment.line_start, comment.last_line());
                    if !lines.is_empty() {
                        out.push(format!("{FENCE}{}", file.extension().unwrap_or("")));
                        out.extend(lines.iter().map(|l| format!("{}{}", l.prefix, l.content)));
                        out.push(FENCE.to_string());
                    }
                }
            }

            out.extend(quote_body(&comment.body));
            ids.push(comment.id.clone());
        }
    }
    out.push(String::new());
    out.push(format!("{IDS_TRAILER_OPEN} {} {IDS_TRAILER_CLOSE}", ids.join(",")));

    Some(ReviewMessage {
        text: out.join("\n"),
        comment_ids: ids,
    })
}

fn matches_path(file: &FileDiff, path: &str) -> bool {
    file.path() == path || file.new_path == path || file.old_path == path
}

/// Every line whose new-side number is in `[start, end]`, each preceded by
/// the removed lines directly above it (replacement context).
fn context_lines(file: &FileDiff, start: usize, end: usize) -> Vec<&DiffLine> {
    let mut picked = Vec::new();
    for hunk in &file.hunks {
        let mut next_free = 0;
        for (idx, line) in hunk.lines.iter().enumerate() {
            let in_range = line.new_num.map(|n| n >= start && n <= end).unwrap_or(false);
            if !in_range {
                continue;
            }
            let mut run_start = idx;
            while run_start > 0 && hunk.lines[run_start - 1].line_type == LineType::Removed {
                run_start -= 1;
            }
            picked.extend(&hunk.lines[run_start.max(next_free)..=idx]);
            next_free = idx + 1;
        }
    }
    picked
}

/// Every body line is block-quoted; blank lines become a bare `>`
fn quote_body(body: &str) -> Vec<String> {
    let lines: Vec<String> = body
        .lines()
        .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {line}") })
        .collect();
    if lines.is_empty() {
        vec![">".to_string()]
    } else {
        lines
    }
}

// ── Parsing ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCodeBlock {
    pub code: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedComment {
    pub line_ref: String,
    pub tag: Option<String>,
    pub body: String,
    pub code: Option<ParsedCodeBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSection {
    pub file_path: String,
    pub comments: Vec<ParsedComment>,
}

/// Whether `text` is a review message produced by [`serialize_review`]
pub fn is_review_message(text: &str) -> bool {
    text.trim_start().starts_with(REVIEW_HEADER)
}

/// Parse a review message back into display sections. A repeated `### path`
/// opens a new section rather than merging into the earlier one.
pub fn parse_review(text: &str) -> Vec<ReviewSection> {
    let mut sections: Vec<ReviewSection> = Vec::new();
    let mut pending: Option<ParsedComment> = None;
    let mut body_started = false;
    let mut code: Option<(Option<String>, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some((language, code_lines)) = code.as_mut() {
            // Captured lines carry a diff prefix, so only a bare fence closes the block
            if line.trim_end() == FENCE {
                if let Some(comment) = pending.as_mut() {
                    comment.code = Some(ParsedCodeBlock {
                        code: code_lines.join("\n"),
                        language: language.take(),
                    });
                }
                code = None;
            } else {
                code_lines.push(line);
            }
            continue;
        }

        if line.trim() == REVIEW_HEADER {
            continue;
        }

        if let Some(path) = line.strip_prefix("### ") {
            commit(&mut sections, pending.take());
            sections.push(ReviewSection {
                file_path: path.trim().to_string(),
                comments: Vec::new(),
            });
            continue;
        }

        if let Some((line_ref, tag)) = parse_ref_line(line) {
            commit(&mut sections, pending.take());
            pending = Some(ParsedComment {
                line_ref,
                tag,
                body: String::new(),
                code: None,
            });
            body_started = false;
            continue;
        }

        let Some(comment) = pending.as_mut() else {
            continue;
        };

        if let Some(lang) = line.trim_start().strip_prefix(FENCE) {
            let lang = lang.trim();
            code = Some((
                if lang.is_empty() { None } else { Some(lang.to_string()) },
                Vec::new(),
            ));
            continue;
        }

        let quoted = if line == ">" { Some("") } else { line.strip_prefix("> ") };
        if let Some(text) = quoted {
            if body_started {
                comment.body.push('\n');
            }
            comment.body.push_str(text);
            body_started = true;
        }
    }

    // Unterminated fence: keep what was captured
    if let (Some((language, code_lines)), Some(comment)) = (code, pending.as_mut()) {
        comment.code = Some(ParsedCodeBlock {
            code: code_lines.join("\n"),
            language,
        });
    }
    commit(&mut sections, pending);
    sections
}

fn commit(sections: &mut [ReviewSection], comment: Option<ParsedComment>) {
    if let (Some(section), Some(comment)) = (sections.last_mut(), comment) {
        section.comments.push(comment);
    }
}

/// `**ref**`, an optional ` [tag]`, then `:`
fn parse_ref_line(line: &str) -> Option<(String, Option<String>)> {
    let after = line.strip_prefix("**")?;
    let close = after.find("**")?;
    let line_ref = after[..close].trim();
    if line_ref.is_empty() {
        return None;
    }
    let mut rest = after[close + 2..].trim_start();
    let mut tag = None;
    if let Some(inner) = rest.strip_prefix('[') {
        let end = inner.find(']')?;
        tag = Some(inner[..end].trim().to_string()).filter(|t| !t.is_empty());
        rest = inner[end + 1..].trim_start();
    }
    if !rest.starts_with(':') {
        return None;
    }
    Some((line_ref.to_string(), tag))
}

/// Comment ids embedded in the message trailer
pub fn parse_included_ids(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix(IDS_TRAILER_OPEN))
        .flat_map(|rest| {
            rest.trim_end()
                .trim_end_matches(IDS_TRAILER_CLOSE)
                .split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}
