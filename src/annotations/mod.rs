//! Screenshot annotation engine
//!
//! - `canvas`: the overlay orchestrating tools, history and rendering
//! - `tools`: one drawing tool per shape kind plus the select tool
//! - `hit_test`: shape-aware hit-testing, bounds and translation
//! - `history`: bounded undo/redo
//! - `popup`: text-entry popups opened by the text and pin tools
//! - `host`: the page the overlay is attached to

pub mod canvas;
pub mod history;
pub mod host;
pub mod popup;
pub mod tools;

pub use canvas::{AnnotationCanvas, CanvasOptions, CanvasState, FrameItem, KeyEvent};
pub use history::AnnotationHistory;
pub use host::{HeadlessPage, PageHost};
pub use popup::{Popup, PopupAction, PopupKey};
