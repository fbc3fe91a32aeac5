//! Inline text-entry popups opened by the text and comment-pin tools
//!
//! The popups themselves are drawn by the host UI; this is the state the
//! canvas keeps while one is open.

use crate::domain::{Point, Viewport};

/// Comment popup footprint used for keeping it on screen
pub const PIN_POPUP_WIDTH: f32 = 260.0;
pub const PIN_POPUP_HEIGHT: f32 = 180.0;

/// Free-text callout entry
#[derive(Clone, Debug, PartialEq)]
pub struct TextPopup {
    /// Where the callout will be anchored
    pub anchor: Point,
    pub draft: String,
}

/// Comment entry for a numbered pin
#[derive(Clone, Debug, PartialEq)]
pub struct PinPopup {
    pub pin_number: u32,
    pub anchor: Point,
    /// Current text field contents; pre-filled when editing
    pub draft: String,
    /// `false` for a pin created by the click that opened this popup
    pub is_edit: bool,
}

impl PinPopup {
    /// Top-left corner for the popup, kept inside the viewport
    pub fn placement(&self, viewport: Viewport) -> Point {
        let mut left = self.anchor.x + 20.0;
        let mut top = self.anchor.y - 10.0;
        if left + PIN_POPUP_WIDTH > viewport.width {
            left = self.anchor.x - PIN_POPUP_WIDTH;
        }
        if top + PIN_POPUP_HEIGHT > viewport.height {
            top = self.anchor.y - PIN_POPUP_HEIGHT;
        }
        Point::new(left, top.max(10.0))
    }
}

/// The single popup that may be open at a time
#[derive(Clone, Debug, PartialEq)]
pub enum Popup {
    Text(TextPopup),
    Pin(PinPopup),
}

impl Popup {
    pub fn draft(&self) -> &str {
        match self {
            Popup::Text(p) => &p.draft,
            Popup::Pin(p) => &p.draft,
        }
    }

    pub fn draft_mut(&mut self) -> &mut String {
        match self {
            Popup::Text(p) => &mut p.draft,
            Popup::Pin(p) => &mut p.draft,
        }
    }
}

/// Keys the popups react to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopupKey {
    Enter,
    ShiftEnter,
    Escape,
}

/// Popup buttons
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopupAction {
    Save,
    /// Comment popups only
    Delete,
    Close,
}

impl PopupKey {
    /// Map a key press to the equivalent button, if any
    ///
    /// Shift+Enter inserts a newline in the comment field and saves nothing;
    /// the single-line text field treats it like Enter.
    pub fn action(self, popup: &Popup) -> Option<PopupAction> {
        match (self, popup) {
            (PopupKey::Enter, _) => Some(PopupAction::Save),
            (PopupKey::ShiftEnter, Popup::Text(_)) => Some(PopupAction::Save),
            (PopupKey::ShiftEnter, Popup::Pin(_)) => None,
            (PopupKey::Escape, _) => Some(PopupAction::Close),
        }
    }
}
