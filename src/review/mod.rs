mod codec;
mod comment;
mod loader;
mod request;

pub use codec::{
    is_review_message, parse_included_ids, parse_review, serialize_review, MessageOptions,
    ParsedCodeBlock, ParsedComment, ReviewMessage, ReviewSection, REVIEW_HEADER,
};
pub use comment::{CommentStatus, CommentTag, ReviewComment};
pub use loader::{load_comments, parse_comments, write_requests};
pub use request::{NewComment, ReviewRequest};
