//! Raster drawing surface backed by a tiny-skia pixmap
//!
//! Tools draw in viewport coordinates; the surface's base transform maps
//! them to physical pixels (device pixel ratio on screen, screenshot scale
//! when flattening).

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::RgbaImage;
use tiny_skia::{
    ColorU8, FillRule, IntSize, Paint, Path, Pixmap, PremultipliedColorU8, Stroke, Transform,
};

use super::geometry::text as text_geom;
use crate::config::ShapeColor;
use crate::domain::Point;
use crate::error::CanvasError;

/// A pixmap plus the transform and font used to draw annotations on it
#[derive(Clone)]
pub struct Surface {
    pixmap: Pixmap,
    transform: Transform,
    font: Option<FontArc>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("transform", &self.transform)
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl Surface {
    /// Allocate a transparent surface
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        let pixmap =
            Pixmap::new(width, height).ok_or(CanvasError::NoDrawingContext { width, height })?;
        Ok(Self {
            pixmap,
            transform: Transform::identity(),
            font: None,
        })
    }

    /// Allocate a surface at the image's native resolution with the image as
    /// its base layer
    pub fn from_image(img: &RgbaImage) -> Result<Self, CanvasError> {
        let (width, height) = (img.width(), img.height());
        let size = IntSize::from_wh(width, height)
            .ok_or(CanvasError::NoDrawingContext { width, height })?;
        let mut data = Vec::with_capacity(img.as_raw().len());
        for px in img.pixels() {
            let c = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        let pixmap =
            Pixmap::from_vec(data, size).ok_or(CanvasError::NoDrawingContext { width, height })?;
        Ok(Self {
            pixmap,
            transform: Transform::identity(),
            font: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Replace the base scale applied to everything drawn afterwards
    pub fn set_scale(&mut self, sx: f32, sy: f32) {
        self.transform = Transform::from_scale(sx, sy);
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Font used for text callouts and pin numbers; without one, text is
    /// measured by estimate and glyphs are not rasterized
    pub fn set_font(&mut self, font: Option<FontArc>) {
        self.font = font;
    }

    /// Erase to fully transparent
    pub fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    pub fn stroke(&mut self, path: &Path, color: ShapeColor, stroke: &Stroke) {
        let paint = solid_paint(color);
        self.pixmap
            .stroke_path(path, &paint, stroke, self.transform, None);
    }

    pub fn fill(&mut self, path: &Path, color: ShapeColor) {
        let paint = solid_paint(color);
        self.pixmap
            .fill_path(path, &paint, FillRule::Winding, self.transform, None);
    }

    /// Width of `text` at `font_size` in viewport units
    pub fn measure_text(&self, text: &str, font_size: f32) -> f32 {
        let Some(font) = &self.font else {
            return text_geom::estimated_width(text, font_size);
        };
        let scaled = font.as_scaled(PxScale::from(font_size));
        text.chars()
            .map(|c| scaled.h_advance(scaled.glyph_id(c)))
            .sum()
    }

    /// Draw `text` with its top-left corner at `origin`
    pub fn draw_text(&mut self, text: &str, origin: Point, font_size: f32, color: ShapeColor) {
        let Some(font) = self.font.clone() else {
            return;
        };
        // Glyphs are rasterized directly in device space
        let sx = self.transform.sx;
        let sy = self.transform.sy;
        let px = font_size * sy;
        let scaled = font.as_scaled(PxScale::from(px));
        let mut caret = ab_glyph::point(
            origin.x * sx + self.transform.tx,
            origin.y * sy + self.transform.ty + scaled.ascent(),
        );
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            let glyph = id.with_scale_and_position(px, caret);
            caret.x += scaled.h_advance(id);
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i32 + gx as i32;
                let y = bounds.min.y as i32 + gy as i32;
                self.blend_pixel(x, y, color, coverage);
            });
        }
    }

    /// Draw `text` centered on `center` (both axes)
    pub fn draw_text_centered(
        &mut self,
        text: &str,
        center: Point,
        font_size: f32,
        color: ShapeColor,
    ) {
        let width = self.measure_text(text, font_size);
        let origin = Point::new(center.x - width / 2.0, center.y - font_size / 2.0);
        self.draw_text(text, origin, font_size, color);
    }

    fn blend_pixel(&mut self, x: i32, y: i32, color: ShapeColor, coverage: f32) {
        let (w, h) = (self.pixmap.width() as i32, self.pixmap.height() as i32);
        if x < 0 || y < 0 || x >= w || y >= h {
            return;
        }
        let a = coverage.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let inv = 1.0 - a;
        let idx = (y * w + x) as usize;
        let pixels = self.pixmap.pixels_mut();
        let dst = pixels[idx];
        let alpha = (255.0 * a + dst.alpha() as f32 * inv).round().min(255.0) as u8;
        let mix = |src: u8, dst: u8| {
            ((src as f32 * a + dst as f32 * inv).round() as u8).min(alpha)
        };
        if let Some(px) = PremultipliedColorU8::from_rgba(
            mix(color.r, dst.red()),
            mix(color.g, dst.green()),
            mix(color.b, dst.blue()),
            alpha,
        ) {
            pixels[idx] = px;
        }
    }

    /// Straight-alpha copy of the surface
    pub fn to_rgba_image(&self) -> RgbaImage {
        let (w, h) = (self.pixmap.width(), self.pixmap.height());
        let mut out = RgbaImage::new(w, h);
        for (dst, src) in out.pixels_mut().zip(self.pixmap.pixels()) {
            let c = src.demultiply();
            *dst = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }

    /// Encode the surface as PNG
    pub fn encode_png(&self) -> Result<Vec<u8>, CanvasError> {
        self.pixmap
            .encode_png()
            .map_err(|err| CanvasError::Encode(err.to_string()))
    }
}

fn solid_paint(color: ShapeColor) -> Paint<'static> {
    let [r, g, b, a] = color.to_rgba_u8();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::PathBuilder;

    #[test]
    fn test_zero_sized_surface_is_an_error() {
        assert!(matches!(
            Surface::new(0, 10),
            Err(CanvasError::NoDrawingContext { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_from_image_keeps_base_layer() {
        let img = RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 255]));
        let surface = Surface::from_image(&img).unwrap();
        assert_eq!(surface.to_rgba_image(), img);
    }

    #[test]
    fn test_fill_honors_scale() {
        let mut surface = Surface::new(20, 20).unwrap();
        surface.set_scale(2.0, 2.0);
        let path = PathBuilder::from_rect(tiny_skia::Rect::from_xywh(0.0, 0.0, 5.0, 5.0).unwrap());
        surface.fill(&path, ShapeColor::BLACK);
        let img = surface.to_rgba_image();
        assert_eq!(img.get_pixel(8, 8)[3], 255);
        assert_eq!(img.get_pixel(12, 12)[3], 0);
    }

    #[test]
    fn test_measure_text_estimates_without_font() {
        let surface = Surface::new(1, 1).unwrap();
        assert!((surface.measure_text("hello", 10.0) - 30.0).abs() < 1e-4);
    }
}
