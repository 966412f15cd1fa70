use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentTag {
    Clarity,
    Scope,
    Risk,
    Nit,
}

impl CommentTag {
    pub const ALL: [CommentTag; 4] = [
        CommentTag::Clarity,
        CommentTag::Scope,
        CommentTag::Risk,
        CommentTag::Nit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommentTag::Clarity => "clarity",
            CommentTag::Scope => "scope",
            CommentTag::Risk => "risk",
            CommentTag::Nit => "nit",
        }
    }

    /// Case-insensitive lookup by name
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    #[default]
    Open,
    Resolved,
}

impl CommentStatus {
    pub fn toggled(&self) -> CommentStatus {
        match self {
            CommentStatus::Open => CommentStatus::Resolved,
            CommentStatus::Resolved => CommentStatus::Open,
        }
    }
}

/// A review comment as held by the session store. Read-only here: changes go
/// out as requests and come back in the next snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewComment {
    pub id: String,
    pub session_id: String,
    #[serde(default)]
    pub turn_id: Option<String>,
    pub file_path: String,
    pub line_start: usize,
    #[serde(default)]
    pub line_end: Option<usize>,
    pub body: String,
    #[serde(default)]
    pub tag: Option<CommentTag>,
    #[serde(default)]
    pub status: CommentStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ReviewComment {
    pub fn is_open(&self) -> bool {
        self.status == CommentStatus::Open
    }

    /// Last covered new-side line (single-line comments end where they start)
    pub fn last_line(&self) -> usize {
        self.line_end.unwrap_or(self.line_start).max(self.line_start)
    }

    pub fn covers(&self, line_num: usize) -> bool {
        (self.line_start..=self.last_line()).contains(&line_num)
    }

    /// "Line 3" or "Lines 3–7"
    pub fn line_ref(&self) -> String {
        match self.line_end {
            Some(end) if end != self.line_start => format!("Lines {}\u{2013}{}", self.line_start, end),
            _ => format!("Line {}", self.line_start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_comment(line_start: usize, line_end: Option<usize>) -> ReviewComment {
        ReviewComment {
            id: "c1".to_string(),
            session_id: "s1".to_string(),
            turn_id: None,
            file_path: "src/a.ts".to_string(),
            line_start,
            line_end,
            body: "body".to_string(),
            tag: None,
            status: CommentStatus::Open,
            created_at: String::new(),
            updated_at: None,
        }
    }

    #[test]
    fn tag_parse_accepts_known_tags_case_insensitively() {
        assert_eq!(CommentTag::parse("Risk"), Some(CommentTag::Risk));
        assert_eq!(CommentTag::parse(" nit "), Some(CommentTag::Nit));
        assert_eq!(CommentTag::parse("style"), None);
        for tag in CommentTag::ALL {
            assert_eq!(CommentTag::parse(tag.as_str()), Some(tag));
        }
    }

    #[test]
    fn status_toggled_flips() {
        assert_eq!(CommentStatus::Open.toggled(), CommentStatus::Resolved);
        assert_eq!(CommentStatus::Resolved.toggled(), CommentStatus::Open);
    }

    #[test]
    fn line_ref_single_and_range() {
        assert_eq!(make_comment(3, None).line_ref(), "Line 3");
        assert_eq!(make_comment(3, Some(3)).line_ref(), "Line 3");
        assert_eq!(make_comment(3, Some(7)).line_ref(), "Lines 3\u{2013}7");
    }

    #[test]
    fn covers_includes_both_ends() {
        let comment = make_comment(3, Some(5));
        assert!(comment.covers(3));
        assert!(comment.covers(5));
        assert!(!comment.covers(6));
        assert!(make_comment(4, None).covers(4));
    }

    #[test]
    fn deserializes_camel_case_snapshot_with_defaults() {
        let json = r#"{"id":"c9","sessionId":"s","filePath":"x.rs","lineStart":2,"body":"hm","tag":"scope"}"#;
        let comment: ReviewComment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.tag, Some(CommentTag::Scope));
        assert_eq!(comment.status, CommentStatus::Open);
        assert_eq!(comment.line_end, None);
    }
}
