//! Rectangle outline tool

use tiny_skia::{PathBuilder, Stroke};

use super::{ToolOutput, ToolStyle};
use crate::domain::{Annotation, Bounds, Point, Shape};
use crate::render::Surface;

pub const CURSOR: &str = "crosshair";

#[derive(Clone, Debug, Default)]
pub struct RectangleTool {
    pub style: ToolStyle,
    start: Option<Point>,
}

impl RectangleTool {
    pub fn new(style: ToolStyle) -> Self {
        Self { style, start: None }
    }

    pub fn is_drawing(&self) -> bool {
        self.start.is_some()
    }

    pub fn pointer_down(&mut self, p: Point) -> ToolOutput {
        self.start = Some(p);
        ToolOutput::None
    }

    pub fn pointer_move(&mut self, p: Point) -> ToolOutput {
        match self.start {
            Some(start) => ToolOutput::Preview(self.rect(start, p)),
            None => ToolOutput::None,
        }
    }

    pub fn pointer_up(&mut self, p: Point) -> ToolOutput {
        match self.start.take() {
            Some(start) if start != p => ToolOutput::Commit(self.rect(start, p)),
            _ => ToolOutput::None,
        }
    }

    pub fn cancel(&mut self) {
        self.start = None;
    }

    fn rect(&self, start: Point, end: Point) -> Annotation {
        Annotation::new(
            Shape::Rectangle,
            vec![start, end],
            self.style.color,
            self.style.stroke_width,
        )
    }
}

/// Stroke the axis-aligned box spanned by the two points
pub fn render(annotation: &Annotation, surface: &mut Surface) {
    let [a, b, ..] = annotation.points.as_slice() else {
        return;
    };
    let r = Bounds::from_corners(*a, *b);

    let mut pb = PathBuilder::new();
    pb.move_to(r.x, r.y);
    pb.line_to(r.right(), r.y);
    pb.line_to(r.right(), r.bottom());
    pb.line_to(r.x, r.bottom());
    pb.close();
    let Some(path) = pb.finish() else {
        return;
    };
    let stroke = Stroke {
        width: annotation.stroke_width,
        ..Default::default()
    };
    surface.stroke(&path, annotation.color, &stroke);
}
