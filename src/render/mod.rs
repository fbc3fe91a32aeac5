//! Annotation rendering module
//!
//! This module contains:
//! - Geometry constants shared between hit-testing and rendering
//! - The tiny-skia surface every tool draws onto (screen and flatten)

pub mod geometry;
pub mod surface;

pub use surface::Surface;
