//! Annotation types for drawing on screenshots
//!
//! All annotation types store coordinates in viewport (CSS pixel) coordinates.
//! Flattening maps them onto screenshot pixels later.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::geometry::Point;
use crate::config::ShapeColor;

/// Kind-specific payload of an annotation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Shape {
    /// Freehand polyline
    Pen,
    /// Line from `points[0]` with a head at `points[1]`
    Arrow,
    /// Outline spanned by the diagonal `points[0]`-`points[1]`
    Rectangle,
    /// Callout label anchored at `points[0]`
    Text { text: String },
    /// Numbered comment marker centered on `points[0]`
    #[serde(rename_all = "camelCase")]
    CommentPin {
        pin_number: u32,
        #[serde(default)]
        text: String,
    },
}

/// Unified annotation type for ordered drawing and undo/redo
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(flatten)]
    pub shape: Shape,
    pub points: Vec<Point>,
    pub color: ShapeColor,
    pub stroke_width: f32,
}

/// The closed set of annotation kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    Pen,
    Arrow,
    Rectangle,
    Text,
    CommentPin,
}

impl Annotation {
    pub fn new(shape: Shape, points: Vec<Point>, color: ShapeColor, stroke_width: f32) -> Self {
        Self {
            shape,
            points,
            color,
            stroke_width,
        }
    }

    pub fn kind(&self) -> AnnotationKind {
        match self.shape {
            Shape::Pen => AnnotationKind::Pen,
            Shape::Arrow => AnnotationKind::Arrow,
            Shape::Rectangle => AnnotationKind::Rectangle,
            Shape::Text { .. } => AnnotationKind::Text,
            Shape::CommentPin { .. } => AnnotationKind::CommentPin,
        }
    }

    /// Label text for text callouts and comment pins
    pub fn text(&self) -> Option<&str> {
        match &self.shape {
            Shape::Text { text } | Shape::CommentPin { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn pin_number(&self) -> Option<u32> {
        match self.shape {
            Shape::CommentPin { pin_number, .. } => Some(pin_number),
            _ => None,
        }
    }

    /// First point, if any
    pub fn anchor(&self) -> Option<Point> {
        self.points.first().copied()
    }

    /// Check the committed-shape invariant: enough points for the kind
    pub fn is_complete(&self) -> bool {
        match self.shape {
            Shape::Pen => self.points.len() >= 2,
            Shape::Arrow | Shape::Rectangle => self.points.len() == 2,
            Shape::Text { ref text } => self.points.len() == 1 && !text.is_empty(),
            Shape::CommentPin { .. } => self.points.len() == 1,
        }
    }
}

/// A numbered comment attached to a screenshot
///
/// Separate from the `CommentPin` annotation that draws the marker; this is
/// the content record that later becomes a card comment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommentPin {
    pub number: u32,
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// Toolbar tool selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    Select,
    #[default]
    Pen,
    Arrow,
    Rectangle,
    Text,
    CommentPin,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::Select,
        ToolKind::Pen,
        ToolKind::Arrow,
        ToolKind::Rectangle,
        ToolKind::Text,
        ToolKind::CommentPin,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Select => "select",
            ToolKind::Pen => "pen",
            ToolKind::Arrow => "arrow",
            ToolKind::Rectangle => "rectangle",
            ToolKind::Text => "text",
            ToolKind::CommentPin => "comment-pin",
        }
    }
}

impl From<AnnotationKind> for ToolKind {
    fn from(kind: AnnotationKind) -> Self {
        match kind {
            AnnotationKind::Pen => ToolKind::Pen,
            AnnotationKind::Arrow => ToolKind::Arrow,
            AnnotationKind::Rectangle => ToolKind::Rectangle,
            AnnotationKind::Text => ToolKind::Text,
            AnnotationKind::CommentPin => ToolKind::CommentPin,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|tool| tool.name() == s)
            .ok_or_else(|| format!("unknown tool: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_json_shape() {
        let json = r##"{"type":"comment-pin","points":[{"x":4.0,"y":5.0}],"color":"#ef4444","strokeWidth":3.0,"pinNumber":2,"text":"hi"}"##;
        let ann: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(ann.kind(), AnnotationKind::CommentPin);
        assert_eq!(ann.pin_number(), Some(2));
        assert_eq!(ann.text(), Some("hi"));
        assert_eq!(ann.anchor(), Some(Point::new(4.0, 5.0)));
    }

    #[test]
    fn test_rectangle_json() {
        let json = r##"{"type":"rectangle","points":[{"x":10,"y":10},{"x":110,"y":60}],"color":"#000000","strokeWidth":2}"##;
        let ann: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(ann.shape, Shape::Rectangle);
        assert!(ann.is_complete());
    }

    #[test]
    fn test_completeness_per_kind() {
        let c = ShapeColor::default();
        let one = vec![Point::new(1.0, 1.0)];
        assert!(!Annotation::new(Shape::Pen, one.clone(), c, 3.0).is_complete());
        assert!(!Annotation::new(Shape::Arrow, one.clone(), c, 3.0).is_complete());
        let empty_text = Shape::Text {
            text: String::new(),
        };
        assert!(!Annotation::new(empty_text, one.clone(), c, 3.0).is_complete());
        let pin = Shape::CommentPin {
            pin_number: 1,
            text: String::new(),
        };
        assert!(Annotation::new(pin, one, c, 3.0).is_complete());
    }

    #[test]
    fn test_tool_kind_parse() {
        for tool in ToolKind::ALL {
            assert_eq!(tool.name().parse::<ToolKind>().unwrap(), tool);
        }
        assert!("eraser".parse::<ToolKind>().is_err());
    }
}
