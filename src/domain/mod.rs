//! Pure domain types with minimal dependencies
//!
//! This module contains core types used throughout the crate.
//! Types here carry no rendering or I/O concerns.

pub mod annotation;
pub mod geometry;

pub use annotation::*;
pub use geometry::*;
