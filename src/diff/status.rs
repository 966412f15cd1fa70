use serde::{Deserialize, Serialize};

/// How a file changed between the two sides of a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Deleted,
    Renamed,
    Modified,
}

impl ChangeType {
    pub fn symbol(&self) -> &'static str {
        match self {
            ChangeType::Added => "+",
            ChangeType::Deleted => "-",
            ChangeType::Renamed => "R",
            ChangeType::Modified => "~",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Deleted => "deleted",
            ChangeType::Renamed => "renamed",
            ChangeType::Modified => "modified",
        }
    }
}
