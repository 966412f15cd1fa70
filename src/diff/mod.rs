mod inline;
mod source;
mod status;
mod unified;

pub use inline::{inline_diff, inline_pairs, InlineDiff, InlinePair};
pub use source::join_diff_sources;
pub use status::ChangeType;
pub use unified::{
    file_id, parse_diff, path_extension, DiffHunk, DiffLine, DiffStats, FileDiff, FileId, LineType,
};
