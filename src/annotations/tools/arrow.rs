//! Arrow tool: a line with a filled triangular head at the release point

use tiny_skia::{LineCap, PathBuilder, Stroke};

use super::{ToolOutput, ToolStyle};
use crate::domain::{Annotation, Point, Shape};
use crate::render::Surface;
use crate::render::geometry::arrow;

pub const CURSOR: &str = "crosshair";

#[derive(Clone, Debug, Default)]
pub struct ArrowTool {
    pub style: ToolStyle,
    start: Option<Point>,
}

impl ArrowTool {
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
            Some(start) => ToolOutput::Preview(self.arrow(start, p)),
            None => ToolOutput::None,
        }
    }

    pub fn pointer_up(&mut self, p: Point) -> ToolOutput {
        match self.start.take() {
            // A click without movement draws nothing
            Some(start) if start != p => ToolOutput::Commit(self.arrow(start, p)),
            _ => ToolOutput::None,
        }
    }

    pub fn cancel(&mut self) {
        self.start = None;
    }

    fn arrow(&self, start: Point, end: Point) -> Annotation {
        Annotation::new(
            Shape::Arrow,
            vec![start, end],
            self.style.color,
            self.style.stroke_width,
        )
    }
}

/// Draw the shaft, then the head triangle at `points[1]`
pub fn render(annotation: &Annotation, surface: &mut Surface) {
    let [start, end, ..] = annotation.points.as_slice() else {
        return;
    };
    let (start, end) = (*start, *end);

    let mut pb = PathBuilder::new();
    pb.move_to(start.x, start.y);
    pb.line_to(end.x, end.y);
    if let Some(path) = pb.finish() {
        let stroke = Stroke {
            width: annotation.stroke_width,
            line_cap: LineCap::Round,
            ..Default::default()
        };
        surface.stroke(&path, annotation.color, &stroke);
    }

    let (left, right) = arrow::head_points(start, end, arrow::head_length(annotation.stroke_width));
    let mut pb = PathBuilder::new();
    pb.move_to(end.x, end.y);
    pb.line_to(left.x, left.y);
    pb.line_to(right.x, right.y);
    pb.close();
    if let Some(path) = pb.finish() {
        surface.fill(&path, annotation.color);
    }
}
