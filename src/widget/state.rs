//! Controller state and attachment records

use std::fmt;

use image::RgbaImage;

use crate::annotations::CanvasState;
use crate::capture::Blob;
use crate::capture::optimize::Thumbnail;
use crate::domain::CommentPin;

/// Top-level widget state
///
/// `idle → panel-open → annotating → panel-open → submitting →
/// success | error → idle`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WidgetState {
    #[default]
    Idle,
    PanelOpen,
    Annotating,
    Submitting,
    Success,
    Error,
}

impl WidgetState {
    pub fn name(self) -> &'static str {
        match self {
            WidgetState::Idle => "idle",
            WidgetState::PanelOpen => "panel-open",
            WidgetState::Annotating => "annotating",
            WidgetState::Submitting => "submitting",
            WidgetState::Success => "success",
            WidgetState::Error => "error",
        }
    }
}

impl fmt::Display for WidgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events host pages can subscribe to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WidgetEvent {
    Open,
    Close,
    Submit,
    Error,
}

/// Which attachment list an index refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    Screenshot,
    File,
}

/// One annotated screenshot, editable until submission
#[derive(Clone, Debug)]
pub struct ScreenshotSession {
    /// The raw capture, kept so the session can be re-edited
    pub screenshot: RgbaImage,
    pub state: CanvasState,
    /// Flattened and optimized upload payload
    pub blob: Blob,
    pub thumbnail: Thumbnail,
}

impl ScreenshotSession {
    pub fn pins(&self) -> &[CommentPin] {
        &self.state.pins
    }
}

/// A file picked by the user, before processing
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub blob: Blob,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, blob: Blob) -> Self {
        Self {
            name: name.into(),
            blob,
        }
    }
}

/// A processed file or recording waiting for upload
#[derive(Clone, Debug)]
pub struct FileAttachment {
    pub name: String,
    pub blob: Blob,
    pub thumbnail: Thumbnail,
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_` and cap the length
/// at 200 characters
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(200)
        .collect()
}
