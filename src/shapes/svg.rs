//! Conversion of SVG paths into shapes.

use super::{center, ShapeWithId};
use crate::geometry::clipper::{
    diff_ex, offset_ex, offset_polylines, union_polygons, OffsetEnd, OffsetJoin,
};
use crate::geometry::polygon::to_polygons;
use crate::geometry::{ExPolygons, FillRule, Point, Polygon, Polygons, Polyline, Polylines};
use crate::operations::heal::{heal_polygons, HealedExPolygons};

/// Stroke style of a path, lengths in shape points.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeParams {
    pub width: f64,
    pub join: OffsetJoin,
    pub cap: OffsetEnd,
    /// Alternating dash and gap lengths; empty for a solid line.
    pub dashes: Vec<f64>,
    pub dash_offset: f64,
}

impl StrokeParams {
    #[must_use]
    pub fn solid(width: f64) -> Self {
        Self {
            width,
            join: OffsetJoin::Miter,
            cap: OffsetEnd::Butt,
            dashes: Vec::new(),
            dash_offset: 0.0,
        }
    }
}

/// One flattened SVG shape element.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgPath {
    /// Closed sub-paths.
    pub polygons: Polygons,
    /// Open sub-paths.
    pub polylines: Polylines,
    /// Fill rule, `None` when the path is not filled.
    pub fill: Option<FillRule>,
    pub stroke: Option<StrokeParams>,
    pub visible: bool,
}

/// Provider of flattened SVG paths, e.g. a parsed SVG file.
pub trait SvgSource {
    /// Paths in document order, curves flattened within `tolerance` shape
    /// points.
    fn paths(&self, tolerance: f64) -> Vec<SvgPath>;
}

/// Conversion settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvgLineParams {
    pub tesselation_tolerance: f64,
    pub max_heal_iteration: u32,
}

impl Default for SvgLineParams {
    fn default() -> Self {
        Self {
            tesselation_tolerance: 10.0,
            max_heal_iteration: 10,
        }
    }
}

/// Position inside a repeating dash pattern.
#[derive(Debug, Clone)]
pub struct DashPattern {
    lengths: Vec<f64>,
    index: usize,
    rest: f64,
    is_line: bool,
}

impl DashPattern {
    /// Pattern started `offset` along its length. `None` when the pattern
    /// has no positive length.
    #[must_use]
    pub fn new(dashes: &[f64], offset: f64) -> Option<Self> {
        if dashes.is_empty() || dashes.iter().any(|&d| d < 0.0) {
            return None;
        }
        let mut total: f64 = dashes.iter().sum();
        // Odd count repeats twice so dashes and gaps alternate.
        if dashes.len() % 2 == 1 {
            total *= 2.0;
        }
        if total <= 0.0 {
            return None;
        }
        let mut pattern = Self {
            lengths: dashes.to_vec(),
            index: 0,
            rest: 0.0,
            is_line: true,
        };
        let mut offset = offset.rem_euclid(total);
        while offset > pattern.lengths[pattern.index] {
            offset -= pattern.lengths[pattern.index];
            pattern.advance();
        }
        pattern.rest = pattern.lengths[pattern.index] - offset;
        Some(pattern)
    }

    fn advance(&mut self) {
        self.index = (self.index + 1) % self.lengths.len();
        self.is_line = !self.is_line;
    }
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    let (a, b) = (a.to_f64(), b.to_f64());
    let p = a + (b - a) * t;
    Point::from_f64(p.x, p.y)
}

/// Cuts `polyline` into the dashes of `pattern`.
#[must_use]
pub fn to_dashes(polyline: &Polyline, pattern: &DashPattern) -> Polylines {
    let mut dashes = Polylines::new();
    let Some((&first, rest)) = polyline.points.split_first() else {
        return dashes;
    };
    let mut state = pattern.clone();
    let mut dash: Vec<Point> = Vec::new();
    let mut prev = first;
    for &point in rest {
        let mut length = (point - prev).to_f64().coords.norm();
        while state.rest < length {
            let split = lerp(prev, point, state.rest / length);
            if state.is_line {
                dash.push(prev);
                dash.push(split);
                dashes.push(Polyline::new(std::mem::take(&mut dash)));
            }
            length -= state.rest;
            prev = split;
            state.advance();
            state.rest = state.lengths[state.index];
        }
        if state.is_line {
            dash.push(prev);
        }
        state.rest -= length;
        prev = point;
    }
    if state.is_line {
        dash.push(prev);
        dashes.push(Polyline::new(dash));
    }
    dashes.retain(|d| d.points.len() >= 2);
    dashes
}

fn fill_to_expolygons(path: &SvgPath, fill: FillRule, params: &SvgLineParams) -> HealedExPolygons {
    let mut rings = path.polygons.clone();
    rings.extend(
        path.polylines
            .iter()
            .filter(|p| p.points.len() >= 3)
            .map(|p| Polygon::new(p.points.clone())),
    );
    if rings.is_empty() {
        return HealedExPolygons::default();
    }
    heal_polygons(&rings, fill == FillRule::NonZero, params.max_heal_iteration)
}

/// Band of `width` centered on every closed ring.
fn contour_to_expolygons(polygons: &[Polygon], width: f64, join: OffsetJoin) -> ExPolygons {
    let mut result = ExPolygons::new();
    for polygon in polygons {
        let area = union_polygons(std::slice::from_ref(polygon), FillRule::NonZero);
        let outer = offset_ex(&area, width / 2.0, join);
        let inner = offset_ex(&area, -width / 2.0, join);
        result.extend(diff_ex(&outer, &inner));
    }
    result
}

fn stroke_to_expolygons(
    path: &SvgPath,
    stroke: &StrokeParams,
    params: &SvgLineParams,
) -> HealedExPolygons {
    let half = stroke.width / 2.0;
    let areas = if let Some(pattern) = DashPattern::new(&stroke.dashes, stroke.dash_offset) {
        let mut dashes = Polylines::new();
        for polyline in &path.polylines {
            dashes.extend(to_dashes(polyline, &pattern));
        }
        for polygon in &path.polygons {
            let mut closed = polygon.points.clone();
            closed.extend(polygon.points.first().copied());
            dashes.extend(to_dashes(&Polyline::new(closed), &pattern));
        }
        offset_polylines(&dashes, half, stroke.join, stroke.cap)
    } else {
        let mut areas = contour_to_expolygons(&path.polygons, stroke.width, stroke.join);
        areas.extend(offset_polylines(&path.polylines, half, stroke.join, stroke.cap));
        areas
    };
    let rings = to_polygons(&areas);
    if rings.is_empty() {
        return HealedExPolygons::default();
    }
    heal_polygons(&rings, true, params.max_heal_iteration)
}

/// Shapes of every visible path of `svg`, centered around the origin.
///
/// The fill of path `i` gets id `2 * i`, its stroke `2 * i + 1`. Strokes
/// thinner than `1e-5` are ignored.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn svg_to_shapes<S: SvgSource + ?Sized>(svg: &S, params: &SvgLineParams) -> Vec<ShapeWithId> {
    let mut result = Vec::new();
    for (index, path) in svg.paths(params.tesselation_tolerance).iter().enumerate() {
        if !path.visible {
            continue;
        }
        let id = 2 * index as u32;
        if let Some(fill) = path.fill {
            let healed = fill_to_expolygons(path, fill, params);
            result.push(ShapeWithId {
                id,
                shape: healed.expolygons,
                is_healed: healed.is_healed,
            });
        }
        if let Some(stroke) = path.stroke.as_ref().filter(|s| s.width > 1e-5) {
            let healed = stroke_to_expolygons(path, stroke, params);
            result.push(ShapeWithId {
                id: id + 1,
                shape: healed.expolygons,
                is_healed: healed.is_healed,
            });
        }
    }
    center(&mut result);
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shapes::bounding_box_of_shapes;

    fn pt(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    fn square(x0: i32, y0: i32, size: i32) -> Polygon {
        Polygon::new(vec![
            pt(x0, y0),
            pt(x0 + size, y0),
            pt(x0 + size, y0 + size),
            pt(x0, y0 + size),
        ])
    }

    struct Document(Vec<SvgPath>);

    impl SvgSource for Document {
        fn paths(&self, _tolerance: f64) -> Vec<SvgPath> {
            self.0.clone()
        }
    }

    fn filled(polygons: Polygons) -> SvgPath {
        SvgPath {
            polygons,
            polylines: Vec::new(),
            fill: Some(FillRule::NonZero),
            stroke: None,
            visible: true,
        }
    }

    fn area(shape: &ShapeWithId) -> f64 {
        shape.shape.iter().map(crate::geometry::ExPolygon::area).sum()
    }

    // ── ids ──

    #[test]
    fn fill_and_stroke_get_paired_ids() {
        let mut stroked = filled(vec![square(0, 0, 1000)]);
        stroked.stroke = Some(StrokeParams::solid(100.0));
        let hidden = SvgPath {
            visible: false,
            ..filled(vec![square(0, 0, 10)])
        };
        let svg = Document(vec![filled(vec![square(0, 0, 1000)]), hidden, stroked]);
        let shapes = svg_to_shapes(&svg, &SvgLineParams::default());
        let ids: Vec<u32> = shapes.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 4, 5]);
        assert!(shapes.iter().all(|s| s.is_healed));
    }

    #[test]
    fn shapes_are_centered() {
        let svg = Document(vec![filled(vec![square(1000, 2000, 1000)])]);
        let shapes = svg_to_shapes(&svg, &SvgLineParams::default());
        let bb = bounding_box_of_shapes(&shapes).unwrap();
        assert_eq!(bb.min, pt(-500, -500));
        assert_eq!(bb.max, pt(500, 500));
    }

    // ── fill ──

    #[test]
    fn even_odd_fill_makes_hole() {
        let mut path = filled(vec![square(0, 0, 1000), square(250, 250, 500)]);
        path.fill = Some(FillRule::EvenOdd);
        let shapes = svg_to_shapes(&Document(vec![path]), &SvgLineParams::default());
        approx::assert_relative_eq!(area(&shapes[0]), 750_000.0, epsilon = 1.0);
    }

    // ── stroke ──

    #[test]
    fn closed_stroke_is_a_band() {
        let mut path = filled(vec![square(0, 0, 1000)]);
        path.fill = None;
        path.stroke = Some(StrokeParams::solid(100.0));
        let shapes = svg_to_shapes(&Document(vec![path]), &SvgLineParams::default());
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].id, 1);
        // 1100^2 - 900^2
        approx::assert_relative_eq!(area(&shapes[0]), 400_000.0, epsilon = 1.0);
    }

    #[test]
    fn dashes_split_line() {
        let pattern = DashPattern::new(&[100.0, 50.0], 0.0).unwrap();
        let line = Polyline::new(vec![pt(0, 0), pt(400, 0)]);
        let dashes = to_dashes(&line, &pattern);
        let spans: Vec<(i32, i32)> = dashes
            .iter()
            .map(|d| (d.points[0].x, d.points[d.points.len() - 1].x))
            .collect();
        assert_eq!(spans, vec![(0, 100), (150, 250), (300, 400)]);
    }

    #[test]
    fn dash_offset_starts_inside_pattern() {
        let pattern = DashPattern::new(&[100.0, 50.0], 120.0).unwrap();
        let line = Polyline::new(vec![pt(0, 0), pt(200, 0)]);
        let dashes = to_dashes(&line, &pattern);
        // 30 of gap left, then a full dash.
        assert_eq!(dashes[0].points[0], pt(30, 0));
        assert_eq!(dashes[0].points[1], pt(130, 0));
    }

    #[test]
    fn empty_pattern_is_solid() {
        assert!(DashPattern::new(&[], 0.0).is_none());
        assert!(DashPattern::new(&[0.0, 0.0], 0.0).is_none());
    }
}
