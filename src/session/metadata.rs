//! Page metadata and the console log sink
//!
//! `PageInfo` is what the embedding page knows about itself; it is turned
//! into `PageMetadata` at submission time and rendered into the card
//! description.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Viewport;

/// Entries kept by the console sink
pub const MAX_LOGS: usize = 50;

/// What the embedding page reports about itself
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub url: String,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl PageInfo {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width as f32, self.viewport_height as f32, 1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: ConsoleLevel,
    pub message: String,
    pub timestamp: String,
}

/// Snapshot of the page at submission time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub url: String,
    pub browser: String,
    pub os: String,
    pub viewport: (u32, u32),
    pub screen_resolution: (u32, u32),
    pub timestamp: String,
    pub console_logs: Vec<LogEntry>,
    pub user_agent: String,
    pub custom_data: BTreeMap<String, String>,
}

/// ISO-8601 UTC timestamp with milliseconds
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Bounded sink for the page's recent log lines
///
/// Only records while installed. `install` and `uninstall` are idempotent;
/// uninstalling drops everything recorded so far.
#[derive(Debug)]
pub struct ConsoleCapture {
    entries: Mutex<Option<VecDeque<LogEntry>>>,
}

/// The process-wide sink used by the widget
pub static CONSOLE: ConsoleCapture = ConsoleCapture::new();

impl Default for ConsoleCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleCapture {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(None),
        }
    }

    pub fn install(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.is_none() {
            *entries = Some(VecDeque::with_capacity(MAX_LOGS));
        }
    }

    pub fn uninstall(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        *entries = None;
    }

    pub fn is_installed(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Append a line, evicting the oldest once full. Ignored when not
    /// installed.
    pub fn record(&self, level: ConsoleLevel, message: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = entries.as_mut() else {
            return;
        };
        entries.push_back(LogEntry {
            level,
            message: message.into(),
            timestamp: iso_timestamp(),
        });
        while entries.len() > MAX_LOGS {
            entries.pop_front();
        }
    }

    /// Copy of the buffered lines, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Version string following `marker` in `ua`, e.g. `121.0` after `Firefox/`
fn version_after<'a>(ua: &'a str, marker: &str) -> &'a str {
    let Some(start) = ua.find(marker).map(|i| i + marker.len()) else {
        return "";
    };
    let rest = &ua[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '_'))
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Browser name and version from a user agent
pub fn parse_browser(ua: &str) -> String {
    if ua.contains("Firefox/") {
        format!("Firefox {}", version_after(ua, "Firefox/"))
    } else if ua.contains("Edg/") {
        format!("Edge {}", version_after(ua, "Edg/"))
    } else if ua.contains("Chrome/") {
        format!("Chrome {}", version_after(ua, "Chrome/"))
    } else if ua.contains("Safari/") {
        format!("Safari {}", version_after(ua, "Version/"))
    } else {
        "Unknown".to_string()
    }
}

/// Operating system from a user agent
pub fn parse_os(ua: &str) -> String {
    if ua.contains("Win") {
        "Windows".to_string()
    } else if ua.contains("iPhone") || ua.contains("iPad") {
        "iOS".to_string()
    } else if ua.contains("Mac") {
        match version_after(ua, "Mac OS X ") {
            "" => "macOS".to_string(),
            version => format!("macOS {}", version.replace('_', ".")),
        }
    } else if ua.contains("Android") {
        "Android".to_string()
    } else if ua.contains("Linux") {
        "Linux".to_string()
    } else {
        "Unknown".to_string()
    }
}

pub fn capture_metadata(
    page: &PageInfo,
    custom_data: &BTreeMap<String, String>,
    console: &ConsoleCapture,
) -> PageMetadata {
    PageMetadata {
        url: page.url.clone(),
        browser: parse_browser(&page.user_agent),
        os: parse_os(&page.user_agent),
        viewport: (page.viewport_width, page.viewport_height),
        screen_resolution: (page.screen_width, page.screen_height),
        timestamp: iso_timestamp(),
        console_logs: console.entries(),
        user_agent: page.user_agent.clone(),
        custom_data: custom_data.clone(),
    }
}

/// The user's text followed by a metadata block
pub fn build_description(user_description: &str, metadata: &PageMetadata) -> String {
    let mut lines = vec![
        format!("- URL: {}", metadata.url),
        format!("- Browser: {}", metadata.browser),
        format!("- OS: {}", metadata.os),
        format!("- Viewport: {}x{}", metadata.viewport.0, metadata.viewport.1),
        format!(
            "- Screen: {}x{}",
            metadata.screen_resolution.0, metadata.screen_resolution.1
        ),
        format!("- Captured: {}", metadata.timestamp),
    ];
    for (key, value) in &metadata.custom_data {
        lines.push(format!("- {key}: {value}"));
    }
    [
        user_description,
        "",
        "---",
        "**Feedback Metadata**",
        &lines.join("\n"),
    ]
    .join("\n")
}
