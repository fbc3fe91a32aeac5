//! Select tool: pick the topmost shape and move it by dragging
//!
//! Unlike the drawing tools it works on the canvas collection directly, so
//! the canvas calls it with the shapes instead of going through `ToolSet`.

use tiny_skia::{PathBuilder, Stroke, StrokeDash};

use crate::annotations::hit_test::{bounding_box, hit_test_topmost, translate};
use crate::config::ShapeColor;
use crate::domain::{Annotation, Point};
use crate::render::Surface;
use crate::render::geometry::{HIT_THRESHOLD, selection};

pub const CURSOR: &str = "default";

/// Selection indicator color
pub const SELECTION_COLOR: ShapeColor = ShapeColor::rgb(0x4f, 0x46, 0xe5);

#[derive(Clone, Debug, Default)]
pub struct SelectTool {
    selected: Option<usize>,
    drag_anchor: Option<Point>,
    moved: bool,
}

impl SelectTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn set_selected(&mut self, index: Option<usize>) {
        self.selected = index;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    /// Select the topmost shape under `p`, or clear the selection on a miss
    pub fn pointer_down(&mut self, p: Point, annotations: &[Annotation]) -> Option<usize> {
        self.moved = false;
        self.selected = hit_test_topmost(p, annotations, HIT_THRESHOLD);
        self.drag_anchor = self.selected.map(|_| p);
        self.selected
    }

    /// Shift the selected shape by the delta since the last event
    ///
    /// Returns the index of the moved shape.
    pub fn pointer_move(&mut self, p: Point, annotations: &mut [Annotation]) -> Option<usize> {
        let (Some(idx), Some(anchor)) = (self.selected, self.drag_anchor) else {
            return None;
        };
        let ann = annotations.get_mut(idx)?;
        let (dx, dy) = (p.x - anchor.x, p.y - anchor.y);
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        *ann = translate(ann, dx, dy);
        self.drag_anchor = Some(p);
        self.moved = true;
        Some(idx)
    }

    /// End the drag; the selection stays. Returns whether anything moved.
    pub fn pointer_up(&mut self) -> bool {
        self.drag_anchor = None;
        std::mem::take(&mut self.moved)
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.drag_anchor = None;
        self.moved = false;
    }
}

/// Dashed box around a shape's bounds
pub fn draw_selection_box(annotation: &Annotation, surface: &mut Surface) {
    let b = bounding_box(annotation).expand(selection::PADDING);
    let mut pb = PathBuilder::new();
    pb.move_to(b.x, b.y);
    pb.line_to(b.right(), b.y);
    pb.line_to(b.right(), b.bottom());
    pb.line_to(b.x, b.bottom());
    pb.close();
    let Some(path) = pb.finish() else {
        return;
    };
    let stroke = Stroke {
        width: selection::LINE_WIDTH,
        dash: StrokeDash::new(selection::DASH.to_vec(), 0.0),
        ..Default::default()
    };
    surface.stroke(&path, SELECTION_COLOR, &stroke);
}
