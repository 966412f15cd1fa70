use super::comment::ReviewComment;
use super::request::ReviewRequest;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Load a comment snapshot (JSON array). A missing or invalid file is an
/// empty snapshot, never an error.
pub fn load_comments(path: &Path) -> Vec<ReviewComment> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read comment snapshot");
            return Vec::new();
        }
    };
    parse_comments(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "failed to parse comment snapshot");
        Vec::new()
    })
}

/// Parse a comment snapshot from JSON text
pub fn parse_comments(content: &str) -> Result<Vec<ReviewComment>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(content).context("invalid comment snapshot")
}

/// Append requests as JSON lines (one object per request)
pub fn write_requests<W: Write>(out: &mut W, requests: &[ReviewRequest]) -> Result<()> {
    for request in requests {
        let line = serde_json::to_string(request).context("failed to encode request")?;
        writeln!(out, "{line}")?;
    }
    Ok(())
}
