//! Contract for the calls a submission makes against the tracker

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardList {
    pub public_id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub public_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lists: Vec<BoardList>,
}

impl Board {
    /// First list whose name matches `name`, ignoring case
    pub fn find_list(&self, name: &str) -> Option<&BoardList> {
        let name = name.to_lowercase();
        self.lists.iter().find(|list| list.name.to_lowercase() == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub public_id: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardPosition {
    Start,
    #[default]
    End,
}

/// Card creation request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub title: String,
    pub description: String,
    pub list_public_id: String,
    pub label_public_ids: Vec<String>,
    pub member_public_ids: Vec<String>,
    pub position: CardPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_created_by_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_created_by_email: Option<String>,
}

/// Presigned upload target
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UploadUrl {
    pub url: String,
    pub key: String,
}

/// Registers an uploaded object with its card
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentConfirmation {
    pub s3_key: String,
    pub filename: String,
    pub original_filename: String,
    pub content_type: String,
    pub size: usize,
}

/// External author recorded on cards and comments
///
/// Empty name or email is omitted from the request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAuthor {
    #[serde(
        rename = "externalCreatedByName",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        rename = "externalCreatedByEmail",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
}

impl CommentAuthor {
    pub fn new(name: &str, email: &str) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            name: non_empty(name),
            email: non_empty(email),
        }
    }
}

pub trait ApiClient {
    fn get_board(&self, board_id: &str) -> impl Future<Output = Result<Board, ApiError>>;

    fn create_list(
        &self,
        board_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<BoardList, ApiError>>;

    fn create_card(&self, card: &NewCard) -> impl Future<Output = Result<Card, ApiError>>;

    fn generate_upload_url(
        &self,
        card_id: &str,
        filename: &str,
        content_type: &str,
        size: usize,
    ) -> impl Future<Output = Result<UploadUrl, ApiError>>;

    /// PUT the payload to a presigned URL
    fn upload_blob(
        &self,
        url: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> impl Future<Output = Result<(), ApiError>>;

    fn confirm_attachment(
        &self,
        card_id: &str,
        attachment: &AttachmentConfirmation,
    ) -> impl Future<Output = Result<(), ApiError>>;

    fn add_comment(
        &self,
        card_id: &str,
        comment: &str,
        author: &CommentAuthor,
    ) -> impl Future<Output = Result<(), ApiError>>;
}

/// User-facing message for a failed request: `error.message` from the JSON
/// body, then `message`, else a generic status line
pub fn error_message_from_body(status: u16, body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|json| {
        json.pointer("/error/message")
            .and_then(|m| m.as_str())
            .or_else(|| json.get("message").and_then(|m| m.as_str()))
            .filter(|m| !m.is_empty())
    });
    match message {
        Some(message) => message.to_string(),
        None => format!("API error: {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_precedence() {
        assert_eq!(
            error_message_from_body(403, r#"{"error":{"message":"Invalid API key"},"message":"x"}"#),
            "Invalid API key"
        );
        assert_eq!(
            error_message_from_body(404, r#"{"message":"Board not found"}"#),
            "Board not found"
        );
        assert_eq!(error_message_from_body(502, "<html>bad gateway</html>"), "API error: 502");
        assert_eq!(error_message_from_body(500, r#"{"error":"boom"}"#), "API error: 500");
    }

    #[test]
    fn test_new_card_omits_missing_author() {
        let card = NewCard {
            title: "t".to_string(),
            description: "d".to_string(),
            list_public_id: "l1".to_string(),
            label_public_ids: vec![],
            member_public_ids: vec![],
            position: CardPosition::End,
            external_created_by_name: Some("Ada".to_string()),
            external_created_by_email: None,
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["listPublicId"], "l1");
        assert_eq!(json["position"], "end");
        assert_eq!(json["externalCreatedByName"], "Ada");
        assert!(json.get("externalCreatedByEmail").is_none());
    }

    #[test]
    fn test_comment_author_skips_empty_fields() {
        let author = CommentAuthor::new("", "ada@example.com");
        let json = serde_json::to_value(&author).unwrap();
        assert_eq!(json, serde_json::json!({"externalCreatedByEmail": "ada@example.com"}));
    }

    #[test]
    fn test_find_list_ignores_case() {
        let board: Board = serde_json::from_str(
            r#"{"publicId":"b1","name":"Product","lists":[
                {"publicId":"l1","name":"Backlog"},
                {"publicId":"l2","name":"FEEDBACK"}]}"#,
        )
        .unwrap();
        assert_eq!(board.find_list("feedback").map(|l| l.public_id.as_str()), Some("l2"));
        assert!(board.find_list("Done").is_none());
    }
}
