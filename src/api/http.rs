//! `reqwest` implementation of [`ApiClient`]
//!
//! Every call goes to `<server>/api/v1` with the board's API key in the
//! `x-api-key` header. Non-2xx answers become [`ApiError::Server`] carrying
//! the message from the JSON error body.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::client::{
    ApiClient, AttachmentConfirmation, Board, BoardList, Card, CommentAuthor, NewCard, UploadUrl,
    error_message_from_body,
};
use crate::error::ApiError;

/// HTTP client for one tracker instance
#[derive(Clone, Debug)]
pub struct KanApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateListBody<'a> {
    board_public_id: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlBody<'a> {
    card_public_id: &'a str,
    filename: &'a str,
    content_type: &'a str,
    size: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmBody<'a> {
    card_public_id: &'a str,
    #[serde(flatten)]
    attachment: &'a AttachmentConfirmation,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentBody<'a> {
    card_public_id: &'a str,
    comment: &'a str,
    #[serde(flatten)]
    author: &'a CommentAuthor,
}

/// `<server>/api/v1`, tolerating one trailing slash on the server URL
pub fn api_base_url(server_url: &str) -> String {
    let server = server_url.strip_suffix('/').unwrap_or(server_url);
    format!("{server}/api/v1")
}

impl KanApiClient {
    pub fn new(server_url: &str, api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), server_url, api_key)
    }

    /// Reuse an existing [`reqwest::Client`] and its connection pool
    pub fn with_client(
        client: reqwest::Client,
        server_url: &str,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: api_base_url(server_url),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(self.url(path))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Map a non-2xx response to [`ApiError::Server`] with the body's
    /// error message
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: error_message_from_body(status.as_u16(), &body),
            });
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

impl ApiClient for KanApiClient {
    async fn get_board(&self, board_id: &str) -> Result<Board, ApiError> {
        self.get(&format!("/boards/{board_id}")).await
    }

    async fn create_list(&self, board_id: &str, name: &str) -> Result<BoardList, ApiError> {
        let body = CreateListBody {
            board_public_id: board_id,
            name,
        };
        self.post("/lists", &body).await
    }

    async fn create_card(&self, card: &NewCard) -> Result<Card, ApiError> {
        self.post("/cards", card).await
    }

    async fn generate_upload_url(
        &self,
        card_id: &str,
        filename: &str,
        content_type: &str,
        size: usize,
    ) -> Result<UploadUrl, ApiError> {
        let body = UploadUrlBody {
            card_public_id: card_id,
            filename,
            content_type,
            size,
        };
        self.post(&format!("/cards/{card_id}/attachments/upload-url"), &body)
            .await
    }

    async fn upload_blob(
        &self,
        url: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data.to_vec())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upload {
                filename: filename.to_string(),
                status: status.as_u16(),
            });
        }
        log::debug!("Uploaded {} ({} bytes)", filename, data.len());
        Ok(())
    }

    async fn confirm_attachment(
        &self,
        card_id: &str,
        attachment: &AttachmentConfirmation,
    ) -> Result<(), ApiError> {
        let body = ConfirmBody {
            card_public_id: card_id,
            attachment,
        };
        let _: serde_json::Value = self
            .post(&format!("/cards/{card_id}/attachments/confirm"), &body)
            .await?;
        Ok(())
    }

    async fn add_comment(
        &self,
        card_id: &str,
        comment: &str,
        author: &CommentAuthor,
    ) -> Result<(), ApiError> {
        let body = CommentBody {
            card_public_id: card_id,
            comment,
            author,
        };
        let _: serde_json::Value = self
            .post(&format!("/cards/{card_id}/comments"), &body)
            .await?;
        Ok(())
    }
}
