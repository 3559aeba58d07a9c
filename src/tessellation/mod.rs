//! Triangulation of shapes and of surface cuts.

mod cut_to_solid;
mod extrude;
pub mod triangulate;

pub use cut_to_solid::cut_to_solid;
pub use extrude::polygons_to_model;
pub use triangulate::{triangulate_expolygons, triangulate_region};
