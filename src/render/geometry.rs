//! Shared geometry calculations for annotations
//!
//! This module contains constants and math shared between
//! hit-testing and rendering, so the clickable area always
//! matches what is drawn.

use crate::domain::Point;

/// Default hit-test tolerance in CSS pixels
pub const HIT_THRESHOLD: f32 = 8.0;

/// Arrow geometry constants
pub mod arrow {
    use super::Point;

    /// Smallest arrowhead length in logical pixels
    pub const MIN_HEAD_LENGTH: f32 = 12.0;
    /// Arrowhead length per unit of stroke width
    pub const HEAD_LENGTH_PER_WIDTH: f32 = 4.0;
    /// Arrowhead half-angle from shaft in radians (30 degrees)
    pub const HEAD_ANGLE: f32 = std::f32::consts::FRAC_PI_6;

    /// Arrowhead length for a given stroke width
    #[inline]
    pub fn head_length(stroke_width: f32) -> f32 {
        MIN_HEAD_LENGTH.max(stroke_width * HEAD_LENGTH_PER_WIDTH)
    }

    /// Calculate the two back corners of the arrowhead triangle
    /// (the third corner is the tip at `end`)
    pub fn head_points(start: Point, end: Point, head_length: f32) -> (Point, Point) {
        let angle = (end.y - start.y).atan2(end.x - start.x);
        let left = Point::new(
            end.x - head_length * (angle - HEAD_ANGLE).cos(),
            end.y - head_length * (angle - HEAD_ANGLE).sin(),
        );
        let right = Point::new(
            end.x - head_length * (angle + HEAD_ANGLE).cos(),
            end.y - head_length * (angle + HEAD_ANGLE).sin(),
        );
        (left, right)
    }
}

/// Comment pin marker geometry
pub mod pin {
    /// Marker disc radius
    pub const RADIUS: f32 = 14.0;
    /// Extra slack when clicking a marker
    pub const HIT_TOLERANCE: f32 = 4.0;
    /// White ring around the disc
    pub const BORDER_WIDTH: f32 = 2.0;
    /// Pin number font size
    pub const FONT_SIZE: f32 = 12.0;
}

/// Text callout geometry
pub mod text {
    pub const MIN_FONT_SIZE: f32 = 14.0;
    pub const FONT_SIZE_PER_WIDTH: f32 = 4.0;
    pub const PADDING_X: f32 = 10.0;
    pub const PADDING_Y: f32 = 6.0;
    pub const BORDER_RADIUS: f32 = 6.0;
    /// Height of the pointer triangle under the box
    pub const POINTER_SIZE: f32 = 6.0;
    pub const BORDER_WIDTH: f32 = 1.5;
    /// Average glyph advance as a fraction of the font size, used when no
    /// font is available for measuring
    pub const EST_CHAR_WIDTH: f32 = 0.6;

    #[inline]
    pub fn font_size(stroke_width: f32) -> f32 {
        MIN_FONT_SIZE.max(stroke_width * FONT_SIZE_PER_WIDTH)
    }

    /// Estimated label width without a font
    pub fn estimated_width(text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * EST_CHAR_WIDTH
    }

    /// Callout box size (without the pointer) for a measured text width
    #[inline]
    pub fn box_size(text_width: f32, font_size: f32) -> (f32, f32) {
        (text_width + PADDING_X * 2.0, font_size + PADDING_Y * 2.0)
    }
}

/// Selection indicator geometry
pub mod selection {
    /// Gap between a shape's bounds and the dashed box
    pub const PADDING: f32 = 6.0;
    pub const LINE_WIDTH: f32 = 1.5;
    /// Dash on/off lengths
    pub const DASH: [f32; 2] = [5.0, 4.0];
}
