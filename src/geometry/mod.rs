pub mod clipper;
pub mod expolygons_index;
pub mod intersections;
pub mod point;
pub mod polygon;

pub use clipper::FillRule;
pub use expolygons_index::{ExPolygonsIndex, ExPolygonsIndices};
pub use point::{BoundingBox, Point, Points, SHAPE_SCALE};
pub use polygon::{ExPolygon, ExPolygons, Polygon, Polygons, Polyline, Polylines};
