//! Polygon boolean and offset operations on integer shapes.
//!
//! Thin layer over `geo-clipper`. Shape coordinates are already integers, so
//! the clipper scale factor is one and results round back exactly.

use std::f64::consts::{FRAC_PI_2, TAU};

use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon as GeoPolygon};
use geo_clipper::{Clipper, EndType, JoinType};

use super::point::Point;
use super::polygon::{ExPolygon, ExPolygons, Polygon, Polygons, Polyline};
use crate::math::{Point2, Vector2};

const FACTOR: f64 = 1.0;

/// Largest distance between a round join or cap and its true arc.
const ARC_TOLERANCE: f64 = 0.25;

/// Longest allowed miter, in multiples of the offset.
const MITER_LIMIT: f64 = 2.0;

/// Fill rule used to interpret overlapping or self-intersecting rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// Corner style of an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetJoin {
    Square,
    Round,
    #[default]
    Miter,
}

impl From<OffsetJoin> for JoinType {
    fn from(join: OffsetJoin) -> Self {
        match join {
            OffsetJoin::Square => JoinType::Square,
            OffsetJoin::Round => JoinType::Round(ARC_TOLERANCE),
            OffsetJoin::Miter => JoinType::Miter(MITER_LIMIT),
        }
    }
}

/// End style of an open path offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetEnd {
    #[default]
    Butt,
    Square,
    Round,
}

fn ring_to_geo(points: &[Point]) -> LineString<f64> {
    let mut coords: Vec<GeoCoord<f64>> = points
        .iter()
        .map(|p| GeoCoord {
            x: f64::from(p.x),
            y: f64::from(p.y),
        })
        .collect();
    if let Some(first) = coords.first().copied() {
        coords.push(first);
    }
    LineString::new(coords)
}

fn polygon_to_geo(polygon: &Polygon) -> GeoPolygon<f64> {
    GeoPolygon::new(ring_to_geo(&polygon.points), vec![])
}

fn expolygon_to_geo(expolygon: &ExPolygon) -> GeoPolygon<f64> {
    GeoPolygon::new(
        ring_to_geo(&expolygon.contour.points),
        expolygon
            .holes
            .iter()
            .map(|h| ring_to_geo(&h.points))
            .collect(),
    )
}

fn expolygons_to_geo(expolygons: &[ExPolygon]) -> MultiPolygon<f64> {
    MultiPolygon::new(expolygons.iter().map(expolygon_to_geo).collect())
}

fn polygons_to_geo(polygons: &[Polygon]) -> MultiPolygon<f64> {
    MultiPolygon::new(polygons.iter().map(polygon_to_geo).collect())
}

fn geo_to_ring(ring: &LineString<f64>) -> Polygon {
    let mut points: Vec<Point> = ring.coords().map(|c| Point::from_f64(c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Polygon::new(points)
}

fn geo_to_expolygons(multi: &MultiPolygon<f64>) -> ExPolygons {
    multi
        .0
        .iter()
        .filter_map(|poly| {
            let mut contour = geo_to_ring(poly.exterior());
            if contour.len() < 3 {
                return None;
            }
            contour.make_counter_clockwise();
            let holes = poly
                .interiors()
                .iter()
                .map(geo_to_ring)
                .filter(|h| h.len() >= 3)
                .map(|mut h| {
                    h.make_clockwise();
                    h
                })
                .collect();
            Some(ExPolygon::new(contour, holes))
        })
        .collect()
}

fn empty() -> MultiPolygon<f64> {
    MultiPolygon::new(vec![])
}

/// Union of rings interpreted with the given fill rule.
#[must_use]
pub fn union_polygons(polygons: &[Polygon], fill: FillRule) -> ExPolygons {
    let rings: Vec<&Polygon> = polygons.iter().filter(|p| p.len() >= 3).collect();
    if rings.is_empty() {
        return ExPolygons::new();
    }
    let result = match fill {
        // Each ring keeps its own orientation, so the non-zero winding of the
        // whole set is preserved.
        FillRule::NonZero => {
            let subject = MultiPolygon::new(rings.iter().map(|p| polygon_to_geo(p)).collect());
            subject.union(&empty(), FACTOR)
        }
        FillRule::EvenOdd => rings.iter().fold(empty(), |acc, ring| {
            let ring = MultiPolygon::new(vec![polygon_to_geo(ring)]);
            acc.xor(&ring, FACTOR)
        }),
    };
    geo_to_expolygons(&result)
}

/// Union of expolygons with themselves.
#[must_use]
pub fn union_ex(expolygons: &[ExPolygon]) -> ExPolygons {
    if expolygons.is_empty() {
        return ExPolygons::new();
    }
    geo_to_expolygons(&expolygons_to_geo(expolygons).union(&empty(), FACTOR))
}

/// Union of two expolygon sets.
#[must_use]
pub fn union_two(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    geo_to_expolygons(&expolygons_to_geo(subject).union(&expolygons_to_geo(clip), FACTOR))
}

/// `subject - clip`.
#[must_use]
pub fn diff_ex(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() {
        return ExPolygons::new();
    }
    if clip.is_empty() {
        return subject.to_vec();
    }
    geo_to_expolygons(&expolygons_to_geo(subject).difference(&expolygons_to_geo(clip), FACTOR))
}

/// `subject - clip` where the clip is a set of plain rings.
#[must_use]
pub fn diff_polygons_ex(subject: &[ExPolygon], clip: &[Polygon]) -> ExPolygons {
    if subject.is_empty() {
        return ExPolygons::new();
    }
    if clip.is_empty() {
        return subject.to_vec();
    }
    geo_to_expolygons(&expolygons_to_geo(subject).difference(&polygons_to_geo(clip), FACTOR))
}

/// `subject ∩ clip`.
#[must_use]
pub fn intersection_ex(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() || clip.is_empty() {
        return ExPolygons::new();
    }
    geo_to_expolygons(&expolygons_to_geo(subject).intersection(&expolygons_to_geo(clip), FACTOR))
}

/// Grows (positive `delta`) or shrinks expolygons.
#[must_use]
pub fn offset_ex(expolygons: &[ExPolygon], delta: f64, join: OffsetJoin) -> ExPolygons {
    if expolygons.is_empty() {
        return ExPolygons::new();
    }
    let result =
        expolygons_to_geo(expolygons).offset(delta, join.into(), EndType::ClosedPolygon, FACTOR);
    geo_to_expolygons(&result)
}

/// Turns open polylines into areas of half width `delta`.
///
/// Open paths are stroked into closed pieces (segment bodies, joins and
/// caps) that are then merged with a non-zero union. The clipper offset
/// drops open subjects while it normalises orientation, so it is only used
/// for closed rings.
#[must_use]
pub fn offset_polylines(
    polylines: &[Polyline],
    delta: f64,
    join: OffsetJoin,
    end: OffsetEnd,
) -> ExPolygons {
    if delta <= 0.0 {
        return ExPolygons::new();
    }
    let mut pieces = Polygons::new();
    for polyline in polylines {
        let mut points: Vec<Point2> = polyline.points.iter().map(|p| p.to_f64()).collect();
        points.dedup();
        stroke(&points, delta, join, end, &mut pieces);
    }
    union_polygons(&pieces, FillRule::NonZero)
}

fn left(u: Vector2) -> Vector2 {
    Vector2::new(-u.y, u.x)
}

fn ring(points: impl IntoIterator<Item = Point2>) -> Polygon {
    let mut polygon =
        Polygon::new(points.into_iter().map(|p| Point::from_f64(p.x, p.y)).collect());
    polygon.make_counter_clockwise();
    polygon
}

/// Points of the arc around `center` from direction `from` turning by
/// `angle` (counter-clockwise when positive), both ends included.
fn arc(center: Point2, from: Vector2, angle: f64, radius: f64) -> impl Iterator<Item = Point2> {
    let step = (2.0 * (1.0 - (ARC_TOLERANCE / radius).min(1.0)).acos()).min(FRAC_PI_2);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let steps = ((angle.abs() / step).ceil() as usize).max(1);
    (0..=steps).map(move |i| {
        #[allow(clippy::cast_precision_loss)]
        let (sin, cos) = (angle * i as f64 / steps as f64).sin_cos();
        let dir = Vector2::new(from.x * cos - from.y * sin, from.x * sin + from.y * cos);
        center + dir * radius
    })
}

fn stroke(points: &[Point2], d: f64, join: OffsetJoin, end: OffsetEnd, pieces: &mut Polygons) {
    let Some(last) = points.len().checked_sub(1).filter(|&n| n > 0) else {
        return;
    };
    let dirs: Vec<Vector2> = points.windows(2).map(|w| (w[1] - w[0]).normalize()).collect();
    for (i, w) in points.windows(2).enumerate() {
        let (u, n) = (dirs[i], left(dirs[i]) * d);
        let mut a = w[0];
        let mut b = w[1];
        if end == OffsetEnd::Square {
            if i == 0 {
                a -= u * d;
            }
            if i + 1 == last {
                b += u * d;
            }
        }
        pieces.push(ring([a - n, b - n, b + n, a + n]));
    }
    if end == OffsetEnd::Round {
        for (p, u) in [(points[0], dirs[0]), (points[last], dirs[last - 1])] {
            pieces.push(ring(arc(p, left(u), TAU, d).skip(1)));
        }
    }

    for (i, &v) in points.iter().enumerate().take(last).skip(1) {
        let (u1, u2) = (dirs[i - 1], dirs[i]);
        let cross = u1.perp(&u2);
        let cos = u1.dot(&u2);
        if cross.abs() < 1e-12 && cos > 0.0 {
            continue;
        }
        // Outer side of the turn.
        let side = if cross > 0.0 { -1.0 } else { 1.0 };
        let (o1, o2) = (left(u1) * side, left(u2) * side);
        let (ca, cb) = (v + o1 * d, v + o2 * d);
        let miter_fits = 1.0 + cos >= 2.0 / (MITER_LIMIT * MITER_LIMIT);
        match join {
            OffsetJoin::Miter if miter_fits => {
                let tip = v + (o1 + o2) * (d / (1.0 + cos));
                pieces.push(ring([v, ca, tip, cb]));
            }
            OffsetJoin::Round => {
                let angle = cross.atan2(cos).abs() * if o1.perp(&o2) < 0.0 { -1.0 } else { 1.0 };
                pieces.push(ring(std::iter::once(v).chain(arc(v, o1, angle, d))));
            }
            OffsetJoin::Square | OffsetJoin::Miter => {
                let dx = (cross.atan2(cos).abs() / 4.0).tan() * d;
                pieces.push(ring([v, ca, ca + u1 * dx, cb - u2 * dx, cb]));
            }
        }
    }
}

/// Removes vertices closer than `distance` to a neighbour or to the line
/// through their neighbours. Rings that collapse below 3 points become empty.
#[must_use]
pub fn clean_polygon(polygon: &Polygon, distance: f64) -> Polygon {
    let distance_sq = distance * distance;
    let mut points = polygon.points.clone();
    loop {
        let n = points.len();
        if n < 3 {
            return Polygon::default();
        }
        let mut removed = None;
        for i in 0..n {
            let prev = points[(i + n - 1) % n].to_f64();
            let cur = points[i].to_f64();
            let next = points[(i + 1) % n].to_f64();
            if (cur - prev).norm_squared() <= distance_sq
                || crate::math::intersect_2d::point_segment_distance_sq(&prev, &next, &cur)
                    <= distance_sq
            {
                removed = Some(i);
                break;
            }
        }
        match removed {
            Some(i) => {
                points.remove(i);
            }
            None => return Polygon::new(points),
        }
    }
}

/// [`clean_polygon`] over a set, dropping rings that collapse.
#[must_use]
pub fn clean_polygons(polygons: &[Polygon], distance: f64) -> Polygons {
    polygons
        .iter()
        .map(|p| clean_polygon(p, distance))
        .filter(|p| p.len() >= 3)
        .collect()
}
