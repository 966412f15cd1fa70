use glob::{MatchOptions, Pattern};

/// Glob patterns for files that start out collapsed (lockfiles, generated code)
#[derive(Debug, Clone, Default)]
pub struct CollapseRules {
    patterns: Vec<Pattern>,
}

impl CollapseRules {
    /// Invalid globs are silently skipped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| {
                let p = p.as_ref().trim();
                if p.is_empty() {
                    return None;
                }
                Pattern::new(p)
                    .map_err(|e| tracing::warn!(pattern = p, error = %e, "ignoring invalid collapse glob"))
                    .ok()
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Match against the full path, or the file name alone for slash-free patterns
    pub fn matches(&self, path: &str) -> bool {
        let opts = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        let name = path.rsplit('/').next().unwrap_or(path);
        self.patterns.iter().any(|p| {
            p.matches_with(path, opts) || (!p.as_str().contains('/') && p.matches_with(name, opts))
        })
    }
}
