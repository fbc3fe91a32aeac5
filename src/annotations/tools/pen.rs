//! Freehand pen tool

use tiny_skia::{LineCap, LineJoin, PathBuilder, Stroke};

use super::{ToolOutput, ToolStyle};
use crate::domain::{Annotation, Point, Shape};
use crate::render::Surface;

pub const CURSOR: &str = "crosshair";

#[derive(Clone, Debug, Default)]
pub struct PenTool {
    pub style: ToolStyle,
    points: Vec<Point>,
    drawing: bool,
}

impl PenTool {
    pub fn new(style: ToolStyle) -> Self {
        Self {
            style,
            points: Vec::new(),
            drawing: false,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn pointer_down(&mut self, p: Point) -> ToolOutput {
        self.drawing = true;
        self.points = vec![p];
        ToolOutput::None
    }

    pub fn pointer_move(&mut self, p: Point) -> ToolOutput {
        if !self.drawing {
            return ToolOutput::None;
        }
        self.points.push(p);
        ToolOutput::Preview(self.stroke(self.points.clone()))
    }

    pub fn pointer_up(&mut self, _p: Point) -> ToolOutput {
        if !self.drawing {
            return ToolOutput::None;
        }
        self.drawing = false;
        let points = std::mem::take(&mut self.points);
        ToolOutput::Commit(self.stroke(points))
    }

    /// Drop any half-drawn stroke
    pub fn cancel(&mut self) {
        self.drawing = false;
        self.points.clear();
    }

    fn stroke(&self, points: Vec<Point>) -> Annotation {
        Annotation::new(Shape::Pen, points, self.style.color, self.style.stroke_width)
    }
}

/// Draw a pen polyline with rounded caps and joins
pub fn render(annotation: &Annotation, surface: &mut Surface) {
    let [first, rest @ ..] = annotation.points.as_slice() else {
        return;
    };
    if rest.is_empty() {
        return;
    }
    let mut pb = PathBuilder::new();
    pb.move_to(first.x, first.y);
    for p in rest {
        pb.line_to(p.x, p.y);
    }
    let Some(path) = pb.finish() else {
        return;
    };
    let stroke = Stroke {
        width: annotation.stroke_width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    };
    surface.stroke(&path, annotation.color, &stroke);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pen_state_machine() {
        let mut pen = PenTool::new(ToolStyle::default());
        assert_eq!(pen.pointer_move(Point::new(1.0, 1.0)), ToolOutput::None);

        pen.pointer_down(Point::new(0.0, 0.0));
        assert!(pen.is_drawing());
        let ToolOutput::Preview(preview) = pen.pointer_move(Point::new(5.0, 5.0)) else {
            panic!("expected preview");
        };
        assert_eq!(preview.points.len(), 2);
        pen.pointer_move(Point::new(9.0, 3.0));

        let ToolOutput::Commit(done) = pen.pointer_up(Point::new(9.0, 3.0)) else {
            panic!("expected commit");
        };
        assert_eq!(done.points.len(), 3);
        assert_eq!(done.shape, Shape::Pen);
        assert!(!pen.is_drawing());
        assert_eq!(pen.pointer_up(Point::new(0.0, 0.0)), ToolOutput::None);
    }
}
