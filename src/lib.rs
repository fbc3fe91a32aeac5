//! Embeddable feedback capture
//!
//! Annotate a screenshot of the current page with pens, arrows, boxes,
//! text callouts and numbered comment pins, then file it with any attached
//! files as a card on a task-tracker board.
//!
//! - `annotations`: the annotation engine (canvas, tools, history)
//! - `capture`: screenshot contract, recordings and image optimization
//! - `session`: page metadata and console log capture
//! - `api`: the tracker client
//! - `widget`: the controller state machine and its embedding handle

pub mod annotations;
pub mod api;
pub mod capture;
pub mod config;
pub mod domain;
pub mod error;
pub mod render;
pub mod session;
pub mod widget;

pub use annotations::{AnnotationCanvas, CanvasState, HeadlessPage, PageHost};
pub use config::{ShapeColor, WidgetConfig};
pub use domain::{Annotation, CommentPin, Point, Shape, ToolKind, Viewport};
pub use error::{ApiError, AttachmentError, CanvasError, CaptureError, WidgetError};
pub use widget::{FeedbackWidget, WidgetHandle};
