//! Task-tracker API
//!
//! - `client`: the `ApiClient` contract and its request/response types
//! - `http`: `KanApiClient`, the `reqwest` implementation

pub mod client;
pub mod http;

pub use client::{
    ApiClient, AttachmentConfirmation, Board, BoardList, Card, CardPosition, CommentAuthor,
    NewCard, UploadUrl,
};
pub use http::KanApiClient;
