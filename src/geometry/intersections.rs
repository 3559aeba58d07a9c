//! Exact integer detection of duplicate points and crossing segments.

use super::point::{Point, Points};
use super::polygon::{ExPolygon, Polygon};
use crate::math::Point2;

/// Points occurring more than once, sorted and unique.
#[must_use]
pub fn collect_duplicates(mut points: Points) -> Points {
    points.sort_unstable();
    let mut duplicates = Points::new();
    for w in points.windows(2) {
        if w[0] == w[1] && duplicates.last() != Some(&w[0]) {
            duplicates.push(w[0]);
        }
    }
    duplicates
}

fn sign(v: i128) -> i32 {
    match v {
        0 => 0,
        v if v > 0 => 1,
        _ => -1,
    }
}

fn orient(a: Point, b: Point, c: Point) -> i32 {
    sign(i128::from((b - a).cross(c - a)))
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Crossing point of two segments if they touch or cross anywhere.
///
/// Collinear overlaps report the first overlapping endpoint.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn segment_intersection(a0: Point, a1: Point, b0: Point, b1: Point) -> Option<Point2> {
    let o1 = orient(a0, a1, b0);
    let o2 = orient(a0, a1, b1);
    let o3 = orient(b0, b1, a0);
    let o4 = orient(b0, b1, a1);

    if o1 * o2 < 0 && o3 * o4 < 0 {
        let da = a1 - a0;
        let db = b1 - b0;
        let denom = da.cross(db) as f64;
        let t = (b0 - a0).cross(db) as f64 / denom;
        return Some(Point2::new(
            f64::from(a0.x) + f64::from(da.x) * t,
            f64::from(a0.y) + f64::from(da.y) * t,
        ));
    }
    let touching = [
        (o1 == 0 && on_segment(a0, a1, b0), b0),
        (o2 == 0 && on_segment(a0, a1, b1), b1),
        (o3 == 0 && on_segment(b0, b1, a0), a0),
        (o4 == 0 && on_segment(b0, b1, a1), a1),
    ];
    touching
        .iter()
        .find(|(hit, _)| *hit)
        .map(|(_, p)| p.to_f64())
}

struct Segment {
    a: Point,
    b: Point,
    polygon: usize,
    index: usize,
    polygon_len: usize,
    flat: u32,
}

/// Crossing of two segments addressed by the flat index of their start point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionLines {
    pub line_index1: u32,
    pub line_index2: u32,
    pub point: Point2,
}

fn are_neighbours(s: &Segment, t: &Segment) -> bool {
    if s.polygon != t.polygon {
        return false;
    }
    let n = s.polygon_len;
    s.index == t.index || (s.index + 1) % n == t.index || (t.index + 1) % n == s.index
}

/// Crossings between non-adjacent segments of all contours and holes.
///
/// Neighbouring segments of the same ring share an endpoint and are skipped;
/// a shared endpoint of two other segments is a duplicate point, not an
/// intersection.
#[must_use]
pub fn get_intersections(expolygons: &[ExPolygon]) -> Vec<Point2> {
    get_intersection_lines(expolygons)
        .into_iter()
        .map(|i| i.point)
        .collect()
}

/// Like [`get_intersections`] but keeps which segments cross.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn get_intersection_lines(expolygons: &[ExPolygon]) -> Vec<IntersectionLines> {
    let polygons: Vec<&Polygon> = expolygons.iter().flat_map(ExPolygon::polygons).collect();
    let mut segments = Vec::new();
    let mut flat = 0u32;
    for (pi, polygon) in polygons.iter().enumerate() {
        for (index, (a, b)) in polygon.segments().enumerate() {
            segments.push(Segment {
                a,
                b,
                polygon: pi,
                index,
                polygon_len: polygon.len(),
                flat: flat + index as u32,
            });
        }
        flat += polygon.len() as u32;
    }
    // Sweep by min x to skip far apart pairs.
    segments.sort_by_key(|s| s.a.x.min(s.b.x));

    let mut result = Vec::new();
    for (i, s) in segments.iter().enumerate() {
        let s_max_x = s.a.x.max(s.b.x);
        for t in &segments[i + 1..] {
            if t.a.x.min(t.b.x) > s_max_x {
                break;
            }
            if are_neighbours(s, t) {
                continue;
            }
            if s.a == t.a || s.a == t.b || s.b == t.a || s.b == t.b {
                continue;
            }
            if let Some(point) = segment_intersection(s.a, s.b, t.a, t.b) {
                result.push(IntersectionLines {
                    line_index1: s.flat.min(t.flat),
                    line_index2: s.flat.max(t.flat),
                    point,
                });
            }
        }
    }
    result
}

/// Removes consecutive equal points; returns `true` when anything changed.
pub fn remove_same_neighbor(polygon: &mut Polygon) -> bool {
    let before = polygon.points.len();
    polygon.points.dedup();
    while polygon.points.len() > 1 && polygon.points.first() == polygon.points.last() {
        polygon.points.pop();
    }
    before != polygon.points.len()
}

/// [`remove_same_neighbor`] on every ring, dropping rings under 3 points.
pub fn remove_same_neighbor_ex(expolygons: &mut Vec<ExPolygon>) -> bool {
    let mut changed = false;
    for expolygon in expolygons.iter_mut() {
        for polygon in expolygon.polygons_mut() {
            changed |= remove_same_neighbor(polygon);
        }
        let holes_before = expolygon.holes.len();
        expolygon.holes.retain(|h| h.len() >= 3);
        changed |= holes_before != expolygon.holes.len();
    }
    let before = expolygons.len();
    expolygons.retain(|e| e.contour.len() >= 3);
    changed || before != expolygons.len()
}
