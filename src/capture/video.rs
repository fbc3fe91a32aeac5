//! Screen recordings
//!
//! Recording itself happens outside this crate; the controller only receives
//! the finished clip.

use super::Blob;

/// Recordings stop on their own after this many seconds
pub const MAX_RECORDING_SECS: u32 = 120;

/// Container/codec choices, most preferred first
pub const MIME_CANDIDATES: [&str; 6] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    "video/webm",
    "video/mp4",
];

/// A finished screen recording
#[derive(Clone, Debug, PartialEq)]
pub struct Recording {
    pub blob: Blob,
    pub duration_secs: u32,
}

impl Recording {
    pub fn new(blob: Blob, duration_secs: u32) -> Self {
        Self {
            blob,
            duration_secs: duration_secs.min(MAX_RECORDING_SECS),
        }
    }

    /// Upload file name, e.g. `screen-recording-1700000000000.webm`
    pub fn filename(&self, millis: i64) -> String {
        let ext = if self.blob.content_type.starts_with("video/mp4") {
            "mp4"
        } else {
            "webm"
        };
        format!("screen-recording-{millis}.{ext}")
    }
}

/// First candidate the recorder supports; `None` lets the recorder pick
pub fn pick_mime_type(is_supported: impl Fn(&str) -> bool) -> Option<&'static str> {
    MIME_CANDIDATES.into_iter().find(|mime| is_supported(mime))
}

/// `m:ss`
pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
