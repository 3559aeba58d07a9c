//! Layout of text into letter shapes.

use std::collections::HashMap;

use tracing::debug;

use super::{translate, union_with_delta, ShapeWithId};
use crate::geometry::clipper::{offset_ex, union_ex, OffsetJoin};
use crate::geometry::{Point, Polygons, SHAPE_SCALE};
use crate::operations::heal::{heal_polygons, HealedExPolygons};

/// Upper bound of healing rounds for a letter.
pub const MAX_HEAL_ITERATION_OF_TEXT: u32 = 10;

/// Wanted curve flattening error, in millimeters.
const RESOLUTION: f64 = 0.0125;

/// A tab advances as far as this many spaces.
const TAB_SPACES: i32 = 4;

/// Vertical metrics of a font, in font units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FontMetrics {
    pub ascent: i32,
    pub descent: i32,
    pub linegap: i32,
}

/// Outline of one letter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Glyph {
    /// Raw outline rings in shape points, filled with the non-zero rule.
    pub contours: Polygons,
    /// Horizontal advance, in font units.
    pub advance_width: i32,
    pub left_side_bearing: i32,
}

/// Provider of letter outlines, e.g. a parsed font file.
pub trait GlyphSource {
    fn metrics(&self) -> FontMetrics;

    /// Outline of `letter` with curves flattened to `flatness` font units;
    /// `None` when the font has no such letter.
    fn glyph(&self, letter: char, flatness: f64) -> Option<Glyph>;
}

/// Styling of the laid out text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontProp {
    /// Height of the letters, used to scale the boldness and the curve
    /// resolution.
    pub size_in_mm: f64,
    /// Extra space after every letter, in font units.
    pub char_gap: Option<i32>,
    /// Extra space between lines, in font units.
    pub line_gap: Option<i32>,
    /// Outline offset in millimeters; negative makes letters thinner.
    pub boldness: Option<f64>,
    /// Horizontal shift per unit of height.
    pub skew: Option<f64>,
}

impl Default for FontProp {
    fn default() -> Self {
        Self {
            size_in_mm: 10.0,
            char_gap: None,
            line_gap: None,
            boldness: None,
            skew: None,
        }
    }
}

/// Distance between two base lines, in shape points.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn line_height(metrics: &FontMetrics, prop: &FontProp) -> i32 {
    let height = metrics.ascent - metrics.descent + metrics.linegap + prop.line_gap.unwrap_or(0);
    (f64::from(height) / SHAPE_SCALE).round() as i32
}

/// Curve flattening tolerance for letters of `prop.size_in_mm`.
#[must_use]
pub fn flatness(metrics: &FontMetrics, prop: &FontProp) -> f64 {
    let flatness = f64::from(metrics.ascent) * RESOLUTION / prop.size_in_mm;
    // Tiny tolerance explodes the number of curve points.
    flatness.max(RESOLUTION)
}

#[derive(Debug, Clone)]
struct PreparedGlyph {
    shape: HealedExPolygons,
    advance_width: i32,
}

#[allow(clippy::cast_possible_truncation)]
fn prepare_glyph(glyph: Glyph, prop: &FontProp) -> PreparedGlyph {
    let advance = glyph.advance_width + prop.char_gap.unwrap_or(0);
    // A letter without outline, like a space, is trivially healed.
    let mut shape = if glyph.contours.is_empty() {
        HealedExPolygons {
            expolygons: Vec::new(),
            is_healed: true,
        }
    } else {
        heal_polygons(&glyph.contours, true, MAX_HEAL_ITERATION_OF_TEXT)
    };
    if !shape.expolygons.is_empty() {
        if let Some(boldness) = prop.boldness {
            let delta = boldness / SHAPE_SCALE / prop.size_in_mm;
            shape.expolygons =
                union_ex(&offset_ex(&shape.expolygons, delta, OffsetJoin::default()));
        }
        if let Some(ratio) = prop.skew {
            for polygon in shape.expolygons.iter_mut().flat_map(|e| e.polygons_mut()) {
                for p in &mut polygon.points {
                    p.x += (f64::from(p.y) * ratio).round() as i32;
                }
            }
        }
    }
    PreparedGlyph {
        shape,
        advance_width: (f64::from(advance) / SHAPE_SCALE).round() as i32,
    }
}

/// Lays out `text` letter by letter; one shape per character.
///
/// Lines go down from the base line at `y = 0`. Line breaks, tabs and
/// carriage returns give empty shapes, as do letters missing in the font.
#[must_use]
pub fn text_to_shapes<F: GlyphSource + ?Sized>(
    font: &F,
    text: &str,
    prop: &FontProp,
) -> Vec<ShapeWithId> {
    let metrics = font.metrics();
    let flatness = flatness(&metrics, prop);
    let mut cache: HashMap<char, Option<PreparedGlyph>> = HashMap::new();
    let mut glyph = |letter: char| -> Option<PreparedGlyph> {
        cache
            .entry(letter)
            .or_insert_with(|| font.glyph(letter, flatness).map(|g| prepare_glyph(g, prop)))
            .clone()
    };

    let mut cursor = Point::new(0, 0);
    let mut result = Vec::with_capacity(text.chars().count());
    for letter in text.chars() {
        let mut shape = ShapeWithId {
            id: u32::from(letter),
            shape: Vec::new(),
            is_healed: true,
        };
        match letter {
            '\n' => {
                cursor.x = 0;
                // Shape space has y up.
                cursor.y -= line_height(&metrics, prop);
            }
            '\t' => {
                if let Some(space) = glyph(' ') {
                    cursor.x += TAB_SPACES * space.advance_width;
                }
            }
            '\r' => {}
            _ => {
                if let Some(g) = glyph(letter) {
                    shape.shape = g.shape.expolygons;
                    shape.is_healed = g.shape.is_healed;
                    translate(&mut shape.shape, cursor);
                    cursor.x += g.advance_width;
                } else {
                    debug!(?letter, "letter is missing in the font");
                }
            }
        }
        result.push(shape);
    }
    result
}

/// Lays out `text` and joins the letters into one healed shape.
#[must_use]
pub fn text_to_shape<F: GlyphSource + ?Sized>(
    font: &F,
    text: &str,
    prop: &FontProp,
) -> HealedExPolygons {
    let shapes = text_to_shapes(font, text, prop);
    union_with_delta(&shapes, 1.0 / SHAPE_SCALE, MAX_HEAL_ITERATION_OF_TEXT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::polygon::bounding_box_of;
    use crate::geometry::Polygon;

    /// Font whose letters are all the same 2000 x 3000 box.
    struct BoxFont;

    impl GlyphSource for BoxFont {
        fn metrics(&self) -> FontMetrics {
            FontMetrics {
                ascent: 8,
                descent: -2,
                linegap: 1,
            }
        }

        fn glyph(&self, letter: char, _flatness: f64) -> Option<Glyph> {
            match letter {
                ' ' => Some(Glyph {
                    contours: Vec::new(),
                    advance_width: 2,
                    left_side_bearing: 0,
                }),
                'a'..='z' | 'A'..='Z' => Some(Glyph {
                    contours: vec![Polygon::new(vec![
                        Point::new(0, 0),
                        Point::new(2000, 0),
                        Point::new(2000, 3000),
                        Point::new(0, 3000),
                    ])],
                    advance_width: 3,
                    left_side_bearing: 0,
                }),
                _ => None,
            }
        }
    }

    fn min_x(shape: &ShapeWithId) -> i32 {
        bounding_box_of(&shape.shape).unwrap().min.x
    }

    // ── layout ──

    #[test]
    fn letters_advance_along_line() {
        let shapes = text_to_shapes(&BoxFont, "ab", &FontProp::default());
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].id, u32::from('a'));
        assert_eq!(min_x(&shapes[0]), 0);
        assert_eq!(min_x(&shapes[1]), 3000);
        assert!(shapes.iter().all(|s| s.is_healed));
    }

    #[test]
    fn new_line_resets_cursor() {
        let shapes = text_to_shapes(&BoxFont, "a\nb", &FontProp::default());
        assert!(shapes[1].shape.is_empty());
        let bb = bounding_box_of(&shapes[2].shape).unwrap();
        assert_eq!(bb.min, Point::new(0, -11_000));
    }

    #[test]
    fn tab_and_gaps_move_cursor() {
        let prop = FontProp {
            char_gap: Some(1),
            line_gap: Some(2),
            ..FontProp::default()
        };
        let shapes = text_to_shapes(&BoxFont, "\ta", &prop);
        assert_eq!(min_x(&shapes[1]), 4 * 3000);
        assert_eq!(line_height(&BoxFont.metrics(), &prop), 13_000);
    }

    #[test]
    fn missing_letter_is_empty() {
        let shapes = text_to_shapes(&BoxFont, "a1b", &FontProp::default());
        assert!(shapes[1].shape.is_empty());
        assert_eq!(min_x(&shapes[2]), 3000);
    }

    // ── styling ──

    #[test]
    fn skew_shifts_top_of_letter() {
        let prop = FontProp {
            skew: Some(0.5),
            ..FontProp::default()
        };
        let shapes = text_to_shapes(&BoxFont, "a", &prop);
        let bb = bounding_box_of(&shapes[0].shape).unwrap();
        assert_eq!(bb.max.x, 2000 + 1500);
    }

    #[test]
    fn boldness_grows_letter() {
        let prop = FontProp {
            boldness: Some(1.0),
            ..FontProp::default()
        };
        let shapes = text_to_shapes(&BoxFont, "a", &prop);
        let bb = bounding_box_of(&shapes[0].shape).unwrap();
        // 1 mm over 10 mm letters is 100 shape points.
        assert_eq!(bb.min, Point::new(-100, -100));
        assert_eq!(bb.max, Point::new(2100, 3100));
    }

    #[test]
    fn flatness_has_lower_bound() {
        let metrics = FontMetrics {
            ascent: 2000,
            ..FontMetrics::default()
        };
        let huge = FontProp {
            size_in_mm: 1e6,
            ..FontProp::default()
        };
        approx::assert_relative_eq!(flatness(&metrics, &huge), RESOLUTION);
        approx::assert_relative_eq!(flatness(&metrics, &FontProp::default()), 2.5);
    }

    #[test]
    fn close_letters_are_joined() {
        let joined = text_to_shape(&BoxFont, "ab", &FontProp::default());
        // The 1000 point gap is narrower than twice the join delta.
        assert_eq!(joined.expolygons.len(), 1);
        assert!(joined.is_healed);
        let bb = bounding_box_of(&joined.expolygons).unwrap();
        assert_eq!(bb.max, Point::new(5000, 3000));
    }
}
