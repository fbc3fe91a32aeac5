//! Error types for the annotation engine and the widget controller

use thiserror::Error;

/// Unrecoverable drawing-surface failures
#[derive(Debug, Error)]
pub enum CanvasError {
    /// The raster backing store could not be allocated
    #[error("no drawing context available for a {width}x{height} surface")]
    NoDrawingContext { width: u32, height: u32 },
    /// The composite could not be encoded
    #[error("cannot encode image: {0}")]
    Encode(String),
}

/// Screenshot or media capture failures
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture permission denied")]
    PermissionDenied,
    #[error("capture is not supported in this environment")]
    Unsupported,
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Local attachment validation failures; never raised by a collaborator
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("Size limit exceeded ({limit_mb}MB max)")]
    SizeLimitExceeded { limit_mb: u64 },
    #[error("Maximum {max} attachments allowed")]
    TooManyAttachments { max: usize },
    #[error("no attachment at index {0}")]
    NoSuchAttachment(usize),
}

/// Task-tracker API failures
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status; `message` comes from the
    /// JSON error body when one was present
    #[error("{message}")]
    Server { status: u16, message: String },
    /// A presigned upload PUT was rejected
    #[error("Upload failed for {filename}: {status}")]
    Upload { filename: String, status: u16 },
    /// The HTTP request itself failed (network, DNS, TLS, etc.)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Errors surfaced by the widget controller
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid configuration: {0}")]
    ConfigJson(#[from] serde_json::Error),
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
    #[error("Failed to capture screenshot")]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Canvas(#[from] CanvasError),
}
