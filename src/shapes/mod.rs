//! Sources of 2D shapes: text laid out from glyphs and SVG paths.
//!
//! Both adapters only consume outlines through a trait, the font and SVG
//! parsers stay outside the crate. Every produced shape is healed.

pub mod svg;
pub mod text;

pub use svg::{svg_to_shapes, StrokeParams, SvgLineParams, SvgPath, SvgSource};
pub use text::{text_to_shape, text_to_shapes, FontMetrics, FontProp, Glyph, GlyphSource};

use crate::geometry::clipper::{offset_ex, union_ex, OffsetJoin};
use crate::geometry::polygon::bounding_box_of;
use crate::geometry::{BoundingBox, ExPolygon, ExPolygons, Point};
use crate::operations::heal::{heal_expolygons, HealedExPolygons};

/// Shape of one letter or one SVG path part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeWithId {
    /// Unicode code point of a letter; `2 * index` for the fill and
    /// `2 * index + 1` for the stroke of SVG path `index`.
    pub id: u32,
    pub shape: ExPolygons,
    pub is_healed: bool,
}

pub fn translate(shape: &mut [ExPolygon], offset: Point) {
    for expolygon in shape {
        for polygon in expolygon.polygons_mut() {
            for p in &mut polygon.points {
                *p = *p + offset;
            }
        }
    }
}

/// Bounding box over every shape, `None` when all are empty.
#[must_use]
pub fn bounding_box_of_shapes(shapes: &[ShapeWithId]) -> Option<BoundingBox> {
    shapes
        .iter()
        .filter_map(|s| bounding_box_of(&s.shape))
        .reduce(|mut bb, other| {
            bb.merge(&other);
            bb
        })
}

/// Moves the shapes so the center of their bounding box is the origin.
pub fn center(shapes: &mut [ShapeWithId]) {
    let Some(bb) = bounding_box_of_shapes(shapes) else {
        return;
    };
    let offset = -bb.center();
    for s in shapes {
        translate(&mut s.shape, offset);
    }
}

/// Joins all shapes into one healed shape. Growing by `delta` before the
/// union and shrinking after closes gaps narrower than `2 * delta`.
#[must_use]
pub fn union_with_delta(
    shapes: &[ShapeWithId],
    delta: f64,
    max_iterations: u32,
) -> HealedExPolygons {
    let mut grown = ExPolygons::new();
    for s in shapes.iter().filter(|s| !s.shape.is_empty()) {
        grown.extend(offset_ex(&s.shape, delta, OffsetJoin::default()));
    }
    let mut expolygons = offset_ex(&union_ex(&grown), -delta, OffsetJoin::default());
    let is_healed = heal_expolygons(&mut expolygons, max_iterations);
    HealedExPolygons {
        expolygons,
        is_healed: is_healed && shapes.iter().all(|s| s.is_healed),
    }
}
