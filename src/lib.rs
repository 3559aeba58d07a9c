//! Surface cutting and text-emboss geometry.
//!
//! Projects 2D shapes (glyph outlines, SVG paths) onto triangle meshes,
//! extracts the part of the surface lying inside the projected shape and
//! turns that surface patch back into a printable solid.

pub mod config;
pub mod error;
pub mod geometry;
pub mod math;
pub mod operations;
pub mod shapes;
pub mod tessellation;
pub mod topology;

pub use error::{Result, SurfcutError};
