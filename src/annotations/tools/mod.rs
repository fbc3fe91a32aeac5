//! Drawing tools
//!
//! One struct per tool kind. Each drawing tool turns pointer events into
//! `ToolOutput`s and has a `render` function for the shapes it creates.
//! `ToolSet` holds one instance of each and routes by `ToolKind`.

pub mod arrow;
pub mod comment_pin;
pub mod pen;
pub mod rectangle;
pub mod select;
pub mod text;

pub use arrow::ArrowTool;
pub use comment_pin::CommentPinTool;
pub use pen::PenTool;
pub use rectangle::RectangleTool;
pub use select::SelectTool;
pub use text::TextTool;

use super::popup::Popup;
use crate::config::{DEFAULT_STROKE_WIDTH, PRESET_COLORS, ShapeColor};
use crate::domain::{Annotation, Point, Shape, ToolKind};
use crate::render::Surface;

/// Draw color and stroke width shared by every tool
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolStyle {
    pub color: ShapeColor,
    pub stroke_width: f32,
}

impl Default for ToolStyle {
    fn default() -> Self {
        Self {
            color: PRESET_COLORS[0],
            stroke_width: DEFAULT_STROKE_WIDTH,
        }
    }
}

/// Result of feeding one pointer event to a tool
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutput {
    None,
    /// In-progress shape to draw on top of the committed ones
    Preview(Annotation),
    /// Finished shape to add to the collection
    Commit(Annotation),
    /// Open a popup without adding anything yet
    OpenPopup(Popup),
    /// Add a shape and open a popup for it
    CommitWithPopup(Annotation, Popup),
}

/// One instance of every tool
#[derive(Clone, Debug, Default)]
pub struct ToolSet {
    pub select: SelectTool,
    pub pen: PenTool,
    pub arrow: ArrowTool,
    pub rectangle: RectangleTool,
    pub text: TextTool,
    pub comment_pin: CommentPinTool,
}

impl ToolSet {
    pub fn new(style: ToolStyle) -> Self {
        Self {
            select: SelectTool::new(),
            pen: PenTool::new(style),
            arrow: ArrowTool::new(style),
            rectangle: RectangleTool::new(style),
            text: TextTool::new(style),
            comment_pin: CommentPinTool::new(style),
        }
    }

    /// Current style; all tools share it
    pub fn style(&self) -> ToolStyle {
        self.pen.style
    }

    pub fn set_color(&mut self, color: ShapeColor) {
        for style in self.styles_mut() {
            style.color = color;
        }
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        for style in self.styles_mut() {
            style.stroke_width = width;
        }
    }

    fn styles_mut(&mut self) -> [&mut ToolStyle; 5] {
        [
            &mut self.pen.style,
            &mut self.arrow.style,
            &mut self.rectangle.style,
            &mut self.text.style,
            &mut self.comment_pin.style,
        ]
    }

    pub fn cursor(kind: ToolKind) -> &'static str {
        match kind {
            ToolKind::Select => select::CURSOR,
            ToolKind::Pen => pen::CURSOR,
            ToolKind::Arrow => arrow::CURSOR,
            ToolKind::Rectangle => rectangle::CURSOR,
            ToolKind::Text => text::CURSOR,
            ToolKind::CommentPin => comment_pin::CURSOR,
        }
    }

    /// Route a pointer-down to a drawing tool; `Select` is driven by the
    /// canvas and yields nothing here
    pub fn pointer_down(&mut self, kind: ToolKind, p: Point) -> ToolOutput {
        match kind {
            ToolKind::Select => ToolOutput::None,
            ToolKind::Pen => self.pen.pointer_down(p),
            ToolKind::Arrow => self.arrow.pointer_down(p),
            ToolKind::Rectangle => self.rectangle.pointer_down(p),
            ToolKind::Text => self.text.pointer_down(p),
            ToolKind::CommentPin => self.comment_pin.pointer_down(p),
        }
    }

    pub fn pointer_move(&mut self, kind: ToolKind, p: Point) -> ToolOutput {
        match kind {
            ToolKind::Select => ToolOutput::None,
            ToolKind::Pen => self.pen.pointer_move(p),
            ToolKind::Arrow => self.arrow.pointer_move(p),
            ToolKind::Rectangle => self.rectangle.pointer_move(p),
            ToolKind::Text => self.text.pointer_move(p),
            ToolKind::CommentPin => self.comment_pin.pointer_move(p),
        }
    }

    pub fn pointer_up(&mut self, kind: ToolKind, p: Point) -> ToolOutput {
        match kind {
            ToolKind::Select => ToolOutput::None,
            ToolKind::Pen => self.pen.pointer_up(p),
            ToolKind::Arrow => self.arrow.pointer_up(p),
            ToolKind::Rectangle => self.rectangle.pointer_up(p),
            ToolKind::Text => self.text.pointer_up(p),
            ToolKind::CommentPin => self.comment_pin.pointer_up(p),
        }
    }

    /// Whether a drawing gesture is in progress
    pub fn is_drawing(&self) -> bool {
        self.pen.is_drawing() || self.arrow.is_drawing() || self.rectangle.is_drawing()
    }

    /// Abandon any half-drawn shape
    pub fn cancel(&mut self) {
        self.pen.cancel();
        self.arrow.cancel();
        self.rectangle.cancel();
        self.select.clear();
    }
}

/// Draw one annotation with its kind's renderer
pub fn render_annotation(annotation: &Annotation, surface: &mut Surface) {
    match annotation.shape {
        Shape::Pen => pen::render(annotation, surface),
        Shape::Arrow => arrow::render(annotation, surface),
        Shape::Rectangle => rectangle::render(annotation, surface),
        Shape::Text { .. } => text::render(annotation, surface),
        Shape::CommentPin { .. } => comment_pin::render(annotation, surface),
    }
}
