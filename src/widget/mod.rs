//! Feedback widget
//!
//! - `state`: widget states, events and attachment records
//! - `controller`: the state machine and submission flow
//! - `handle`: the init/destroy boundary for embedding frameworks

pub mod controller;
pub mod handle;
pub mod state;

pub use controller::{Collaborators, FeedbackWidget};
pub use handle::WidgetHandle;
pub use state::{AttachmentKind, SelectedFile, WidgetEvent, WidgetState};
