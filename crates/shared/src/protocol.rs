use serde::{Deserialize, Serialize};

use crate::domain::{CommentId, EventId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventSummary {
    pub uqid: EventId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub img_link: String,
    #[serde(default)]
    pub number_of_likes: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<CommentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_comments: Option<u64>,
}

/// A comment as the server sends it. Timestamps and like counts are
/// optional on the wire and get normalized client-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentRecord {
    pub uqid: CommentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_uqid: Option<EventId>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_likes: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaginationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommentPageResponse {
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpsertEventRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uqid: Option<EventId>,
    pub name: String,
    pub description: String,
    pub img_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LikeEventRequest {
    pub uqid: EventId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddCommentRequest {
    pub uqid: EventId,
    pub user: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LikeCommentRequest {
    pub comment_uqid: CommentId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AddCommentResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_uqid: Option<CommentId>,
}

/// Body of a `302` response. The API puts the redirect target here instead
/// of in the `Location` header.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RedirectPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl RedirectPayload {
    pub fn target(&self) -> Option<&str> {
        self.redirect.as_deref().filter(|target| !target.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_request_omits_missing_id() {
        let create = UpsertEventRequest {
            uqid: None,
            name: "A".into(),
            description: "B".into(),
            img_link: "http://x/y.png".into(),
        };
        let json = serde_json::to_value(&create).expect("serialize");
        assert!(json.get("uqid").is_none());
        assert_eq!(json["img_link"], "http://x/y.png");
    }

    #[test]
    fn comment_page_tolerates_missing_fields() {
        let page: CommentPageResponse = serde_json::from_str(
            r#"{"comments":[{"uqid":"c1","user":"ann","text":"hi"}],"next_cursor":null}"#,
        )
        .expect("page");
        assert_eq!(page.comments.len(), 1);
        assert!(page.comments[0].created_at.is_none());
        assert!(page.comments[0].number_of_likes.is_none());
        assert!(page.next_cursor.is_none());
        assert!(page.pagination.is_none());
    }

    #[test]
    fn redirect_target_ignores_empty_values() {
        let empty: RedirectPayload = serde_json::from_str(r#"{"redirect":""}"#).expect("json");
        assert_eq!(empty.target(), None);
        let login: RedirectPayload =
            serde_json::from_str(r#"{"redirect":"/login"}"#).expect("json");
        assert_eq!(login.target(), Some("/login"));
    }
}
