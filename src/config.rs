//! Widget configuration and drawing style defaults

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WidgetError;

/// Default cap on the combined size of all attachments (10 MiB)
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum number of attachments (screenshots, files and recordings together)
pub const MAX_ATTACHMENTS: usize = 6;

/// Default stroke width for every drawing tool
pub const DEFAULT_STROKE_WIDTH: f32 = 3.0;

/// Preset annotation colors offered by the toolbar
pub const PRESET_COLORS: [ShapeColor; 8] = [
    ShapeColor::rgb(0xef, 0x44, 0x44), // red
    ShapeColor::rgb(0xf9, 0x73, 0x16), // orange
    ShapeColor::rgb(0xea, 0xb3, 0x08), // yellow
    ShapeColor::rgb(0x22, 0xc5, 0x5e), // green
    ShapeColor::rgb(0x3b, 0x82, 0xf6), // blue
    ShapeColor::rgb(0x8b, 0x5c, 0xf6), // purple
    ShapeColor::rgb(0x00, 0x00, 0x00), // black
    ShapeColor::rgb(0xff, 0xff, 0xff), // white
];

/// Serializable color, stored as `#rrggbb` in configs and annotation JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShapeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for ShapeColor {
    fn default() -> Self {
        PRESET_COLORS[0]
    }
}

impl ShapeColor {
    pub const BLACK: ShapeColor = ShapeColor::rgb(0, 0, 0);
    pub const WHITE: ShapeColor = ShapeColor::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the leading `#` is optional)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Lenient parse used by the renderer: malformed input draws black
    pub fn from_hex_or_black(hex: &str) -> Self {
        Self::from_hex(hex).unwrap_or(Self::BLACK)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Convert to RGBA format (0-255)
    pub fn to_rgba_u8(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }

    /// Perceived brightness in 0.0-1.0
    pub fn luminance(self) -> f32 {
        (0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32) / 255.0
    }
}

impl fmt::Display for ShapeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ShapeColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| format!("invalid hex color: {s:?}"))
    }
}

impl TryFrom<String> for ShapeColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShapeColor> for String {
    fn from(c: ShapeColor) -> Self {
        c.to_hex()
    }
}

/// Launcher corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LauncherPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

/// Panel theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Auto,
}

/// Embedding configuration supplied at initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    /// Tracker API key
    pub api_key: String,
    /// Board that receives feedback cards
    pub board_id: String,
    /// Tracker instance URL, e.g. `http://localhost:4310`
    pub server_url: String,
    #[serde(default)]
    pub position: LauncherPosition,
    #[serde(default)]
    pub theme: Theme,
    /// Accent color for the launcher and buttons
    #[serde(default = "default_accent_color")]
    pub accent_color: ShapeColor,
    /// List the cards are filed under; created on first submission if missing
    #[serde(default = "default_feedback_list_name")]
    pub feedback_list_name: String,
    /// Extra key/value pairs appended to every card description
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_email: String,
    /// Combined size cap for all attachments, in bytes
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
    /// Hide the built-in launcher; the host opens the panel itself
    #[serde(default)]
    pub hide_launcher: bool,
}

fn default_accent_color() -> ShapeColor {
    ShapeColor::rgb(0x63, 0x66, 0xf1) // indigo
}

fn default_feedback_list_name() -> String {
    "Feedback".to_string()
}

fn default_greeting() -> String {
    "How can we help you?".to_string()
}

fn default_max_attachment_bytes() -> u64 {
    DEFAULT_MAX_ATTACHMENT_BYTES
}

impl WidgetConfig {
    /// Build a configuration with defaults for everything but the connection
    pub fn new(
        api_key: impl Into<String>,
        board_id: impl Into<String>,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            board_id: board_id.into(),
            server_url: server_url.into(),
            position: LauncherPosition::default(),
            theme: Theme::default(),
            accent_color: default_accent_color(),
            feedback_list_name: default_feedback_list_name(),
            metadata: BTreeMap::new(),
            greeting: default_greeting(),
            user_name: String::new(),
            user_email: String::new(),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            hide_launcher: false,
        }
    }

    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, WidgetError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WidgetError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|err| {
            WidgetError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), WidgetError> {
        for (name, value) in [
            ("apiKey", &self.api_key),
            ("boardId", &self.board_id),
            ("serverUrl", &self.server_url),
        ] {
            if value.trim().is_empty() {
                return Err(WidgetError::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Panel greeting, personalized with the user's first name when known
    pub fn personalized_greeting(&self) -> String {
        let Some(first_name) = self.user_name.split_whitespace().next() else {
            return self.greeting.clone();
        };
        let mut chars = self.greeting.chars();
        match chars.next() {
            Some(first) => format!(
                "Hi {first_name}, {}{}",
                first.to_lowercase(),
                chars.as_str()
            ),
            None => format!("Hi {first_name}"),
        }
    }

    /// Size limit rounded to whole megabytes, for user-facing messages
    pub fn max_attachment_megabytes(&self) -> u64 {
        (self.max_attachment_bytes as f64 / 1024.0 / 1024.0).round() as u64
    }
}
