use super::comment::{CommentStatus, CommentTag};
use serde::{Deserialize, Serialize};

/// Payload of a comment creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub file_path: String,
    pub line_start: usize,
    pub line_end: Option<usize>,
    pub body: String,
    pub tag: Option<CommentTag>,
}

/// Fire-and-forget requests for the session collaborator. Their effect is
/// only observed through a later comment snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReviewRequest {
    CreateComment(NewComment),
    #[serde(rename_all = "camelCase")]
    SetCommentStatus { id: String, status: CommentStatus },
    #[serde(rename_all = "camelCase")]
    SendMessage { session_id: String, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_serialize_with_kind_tag() {
        let req = ReviewRequest::SetCommentStatus {
            id: "c1".to_string(),
            status: CommentStatus::Resolved,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["kind"], "setCommentStatus");
        assert_eq!(json["status"], "resolved");

        let req = ReviewRequest::SendMessage {
            session_id: "s1".to_string(),
            text: "hi".to_string(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["sessionId"], "s1");
    }

    #[test]
    fn create_request_flattens_payload() {
        let req = ReviewRequest::CreateComment(NewComment {
            file_path: "a.rs".to_string(),
            line_start: 4,
            line_end: None,
            body: "why?".to_string(),
            tag: Some(CommentTag::Clarity),
        });
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["kind"], "createComment");
        assert_eq!(json["filePath"], "a.rs");
        assert_eq!(json["tag"], "clarity");
    }
}
