//! Numbered comment pins
//!
//! The tool owns the pin counter and the `CommentPin` content records. The
//! matching `CommentPin` annotations live in the canvas collection like every
//! other shape.

use tiny_skia::{PathBuilder, Stroke};

use super::{ToolOutput, ToolStyle};
use crate::annotations::hit_test::pin_hit;
use crate::annotations::popup::{PinPopup, Popup};
use crate::config::ShapeColor;
use crate::domain::{Annotation, CommentPin, Point, Shape};
use crate::render::Surface;
use crate::render::geometry::pin;

pub const CURSOR: &str = "crosshair";

#[derive(Clone, Debug, Default)]
pub struct CommentPinTool {
    pub style: ToolStyle,
    /// Last number handed out; the next pin gets `counter + 1`
    counter: u32,
    pins: Vec<CommentPin>,
}

impl CommentPinTool {
    pub fn new(style: ToolStyle) -> Self {
        Self {
            style,
            counter: 0,
            pins: Vec::new(),
        }
    }

    /// Place a new pin and open its comment popup
    ///
    /// The marker is committed right away so it shows while the comment is
    /// being typed.
    pub fn pointer_down(&mut self, p: Point) -> ToolOutput {
        self.counter += 1;
        let pin_number = self.counter;
        let marker = Annotation::new(
            Shape::CommentPin {
                pin_number,
                text: String::new(),
            },
            vec![p],
            self.style.color,
            self.style.stroke_width,
        );
        let popup = Popup::Pin(PinPopup {
            pin_number,
            anchor: p,
            draft: String::new(),
            is_edit: false,
        });
        ToolOutput::CommitWithPopup(marker, popup)
    }

    pub fn pointer_move(&mut self, _p: Point) -> ToolOutput {
        ToolOutput::None
    }

    pub fn pointer_up(&mut self, _p: Point) -> ToolOutput {
        ToolOutput::None
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn pins(&self) -> &[CommentPin] {
        &self.pins
    }

    pub fn pin(&self, number: u32) -> Option<&CommentPin> {
        self.pins.iter().find(|pin| pin.number == number)
    }

    /// Create or update the record for `number`
    pub fn upsert(&mut self, number: u32, text: &str, anchor: Point) {
        match self.pins.iter_mut().find(|pin| pin.number == number) {
            Some(existing) => {
                existing.text = text.to_string();
                existing.x = anchor.x;
                existing.y = anchor.y;
            }
            None => self.pins.push(CommentPin {
                number,
                text: text.to_string(),
                x: anchor.x,
                y: anchor.y,
            }),
        }
    }

    /// Drop the record for `number`; the counter is left alone so the
    /// number is never reused
    pub fn remove(&mut self, number: u32) -> Option<CommentPin> {
        let idx = self.pins.iter().position(|pin| pin.number == number)?;
        Some(self.pins.remove(idx))
    }

    /// Keep a record in step with its marker after a drag
    pub fn update_position(&mut self, number: u32, anchor: Point) {
        if let Some(pin) = self.pins.iter_mut().find(|pin| pin.number == number) {
            pin.x = anchor.x;
            pin.y = anchor.y;
        }
    }

    /// Popup for re-opening an existing marker, pre-filled with its comment
    pub fn edit_popup(&self, marker: &Annotation) -> Option<Popup> {
        let Shape::CommentPin { pin_number, text } = &marker.shape else {
            return None;
        };
        let anchor = marker.anchor()?;
        let draft = self
            .pin(*pin_number)
            .map(|pin| pin.text.clone())
            .unwrap_or_else(|| text.clone());
        Some(Popup::Pin(PinPopup {
            pin_number: *pin_number,
            anchor,
            draft,
            is_edit: true,
        }))
    }

    /// Topmost pin marker under `p`
    pub fn hit_test(&self, p: Point, annotations: &[Annotation]) -> Option<usize> {
        annotations.iter().rposition(|ann| {
            matches!(ann.shape, Shape::CommentPin { .. })
                && ann.anchor().is_some_and(|anchor| pin_hit(p, anchor))
        })
    }

    /// Start over from pin #1
    pub fn reset(&mut self) {
        self.counter = 0;
        self.pins.clear();
    }

    /// Load records saved with a screenshot session
    ///
    /// The counter resumes after the highest number found in either the
    /// records or the markers, so a marker whose comment was never saved
    /// still reserves its number.
    pub fn restore(&mut self, pins: &[CommentPin], annotations: &[Annotation]) {
        self.pins = pins.to_vec();
        let from_pins = pins.iter().map(|pin| pin.number);
        let from_markers = annotations.iter().filter_map(Annotation::pin_number);
        self.counter = from_pins.chain(from_markers).max().unwrap_or(0);
    }
}

/// Filled disc with a white ring and the pin number in the middle
pub fn render(annotation: &Annotation, surface: &mut Surface) {
    let Shape::CommentPin { pin_number, .. } = &annotation.shape else {
        return;
    };
    let Some(center) = annotation.anchor() else {
        return;
    };
    let Some(path) = PathBuilder::from_circle(center.x, center.y, pin::RADIUS) else {
        return;
    };
    surface.fill(&path, annotation.color);
    let ring = Stroke {
        width: pin::BORDER_WIDTH,
        ..Default::default()
    };
    surface.stroke(&path, ShapeColor::WHITE, &ring);
    surface.draw_text_centered(
        &pin_number.to_string(),
        center,
        pin::FONT_SIZE,
        ShapeColor::WHITE,
    );
}
