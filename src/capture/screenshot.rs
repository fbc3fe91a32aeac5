//! Viewport screenshot contract

use std::future::Future;

use image::RgbaImage;

use crate::error::CaptureError;

/// Captures the current viewport, leaving out the widget's own host element
///
/// Capture may need user permission and can fail; callers roll back to the
/// state they were in before the attempt.
pub trait ScreenshotCapture {
    fn capture(&mut self) -> impl Future<Output = Result<RgbaImage, CaptureError>>;
}

/// Capture source that always returns the same bitmap
#[derive(Clone, Debug)]
pub struct FixedScreenshot {
    image: RgbaImage,
}

impl FixedScreenshot {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }
}

impl ScreenshotCapture for FixedScreenshot {
    async fn capture(&mut self) -> Result<RgbaImage, CaptureError> {
        Ok(self.image.clone())
    }
}
