//! Text callout tool
//!
//! A click opens the text popup; the canvas builds the annotation once the
//! popup is confirmed, so this tool never returns a shape itself.

use tiny_skia::{PathBuilder, Stroke};

use super::{ToolOutput, ToolStyle};
use crate::annotations::popup::{Popup, TextPopup};
use crate::config::ShapeColor;
use crate::domain::{Annotation, Point, Shape};
use crate::render::Surface;
use crate::render::geometry::text as geom;

pub const CURSOR: &str = "text";

/// Label color on light callout fills
pub const DARK_TEXT: ShapeColor = ShapeColor::rgb(0x1f, 0x29, 0x37);

#[derive(Clone, Debug, Default)]
pub struct TextTool {
    pub style: ToolStyle,
}

impl TextTool {
    pub fn new(style: ToolStyle) -> Self {
        Self { style }
    }

    pub fn pointer_down(&mut self, p: Point) -> ToolOutput {
        ToolOutput::OpenPopup(Popup::Text(TextPopup {
            anchor: p,
            draft: String::new(),
        }))
    }

    pub fn pointer_move(&mut self, _p: Point) -> ToolOutput {
        ToolOutput::None
    }

    pub fn pointer_up(&mut self, _p: Point) -> ToolOutput {
        ToolOutput::None
    }

    /// Build the callout for confirmed popup text; `None` for blank input
    pub fn callout(&self, anchor: Point, text: &str) -> Option<Annotation> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Annotation::new(
            Shape::Text {
                text: text.to_string(),
            },
            vec![anchor],
            self.style.color,
            self.style.stroke_width,
        ))
    }
}

/// Label color that stays readable on `fill`
pub fn contrast_color(fill: ShapeColor) -> ShapeColor {
    if fill.luminance() > 0.5 {
        DARK_TEXT
    } else {
        ShapeColor::WHITE
    }
}

/// Rounded box with a pointer at its bottom-left corner, sitting above the
/// anchor
pub fn render(annotation: &Annotation, surface: &mut Surface) {
    let Shape::Text { text } = &annotation.shape else {
        return;
    };
    let Some(anchor) = annotation.anchor() else {
        return;
    };
    if text.is_empty() {
        return;
    }

    let font_size = geom::font_size(annotation.stroke_width);
    let (w, h) = geom::box_size(surface.measure_text(text, font_size), font_size);
    let (x, y) = (anchor.x, anchor.y - h - geom::POINTER_SIZE);
    let r = geom::BORDER_RADIUS;

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + geom::POINTER_SIZE + 8.0, y + h);
    pb.line_to(x, y + h + geom::POINTER_SIZE);
    pb.line_to(x, y + h);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    let Some(path) = pb.finish() else {
        return;
    };

    surface.fill(&path, annotation.color);
    let border = Stroke {
        width: geom::BORDER_WIDTH,
        ..Default::default()
    };
    surface.stroke(&path, ShapeColor::WHITE, &border);
    surface.draw_text(
        text,
        Point::new(x + geom::PADDING_X, y + geom::PADDING_Y),
        font_size,
        contrast_color(annotation.color),
    );
}
