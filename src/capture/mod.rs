//! Capture collaborators and attachment processing
//!
//! - `screenshot`: the viewport capture contract
//! - `video`: screen recordings handed over by an external recorder
//! - `optimize`: downscaling, re-encoding and thumbnails

pub mod optimize;
pub mod screenshot;
pub mod video;

pub use screenshot::{FixedScreenshot, ScreenshotCapture};
pub use video::Recording;

/// Binary payload with its MIME type
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub content_type: String,
}

impl Blob {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.content_type.starts_with("video/")
    }
}
