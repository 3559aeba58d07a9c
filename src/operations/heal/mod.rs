//! Repair of 2D shapes before they are used as exact geometry.
//!
//! Healing removes self-intersections, duplicate points and near-duplicate
//! points. It never fails: a shape that cannot be repaired within the
//! iteration bound is replaced by its bounding rectangle with a hole and the
//! result is flagged as not fully healed.

mod divide;
mod spikes;

pub use divide::divide_segments_for_close_point;
pub use spikes::{remove_bad, remove_spikes_in_duplicates, remove_when_spike, SpikeDesc};

use tracing::{debug, warn};

use crate::geometry::clipper::{clean_polygons, diff_polygons_ex, union_polygons, union_two};
use crate::geometry::intersections::{
    collect_duplicates, get_intersection_lines, remove_same_neighbor_ex,
};
use crate::geometry::polygon::{bounding_box_of, to_points, to_polygons};
use crate::geometry::{
    BoundingBox, ExPolygon, ExPolygons, ExPolygonsIndices, FillRule, Point, Points, Polygon,
    Polygons, SHAPE_SCALE,
};
use crate::math::Point2;

/// Tuning of the healing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealParams {
    /// Upper bound of repair rounds.
    pub max_iterations: u32,
    /// Points closer than this are merged by the initial clean, a little
    /// above `sqrt(2)`.
    pub clean_distance: f64,
    /// Width of a spike after its tip is cut.
    pub spike_bevel: f64,
    /// Length of the narrow part that makes a corner a spike.
    pub spike_length: f64,
}

impl Default for HealParams {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            clean_distance: 1.415,
            spike_bevel: 1.0 / SHAPE_SCALE,
            spike_length: 5.0,
        }
    }
}

/// Result of [`heal_polygons`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealedExPolygons {
    pub expolygons: ExPolygons,
    /// `false` when some part had to be replaced by a bounding rectangle.
    pub is_healed: bool,
}

const PTS_2X2: [Point; 4] = [
    Point::new(0, 0),
    Point::new(1, 0),
    Point::new(1, 1),
    Point::new(0, 1),
];
const PTS_3X3: [Point; 4] = [
    Point::new(-1, -1),
    Point::new(1, -1),
    Point::new(1, 1),
    Point::new(-1, 1),
];

fn square_at(pattern: &[Point; 4], at: Point) -> Polygon {
    Polygon::new(pattern.iter().map(|&p| p + at).collect())
}

/// Heals raw rings interpreted with the non-zero (`is_non_zero`) or even-odd
/// fill rule.
#[must_use]
pub fn heal_polygons(
    shape: &[Polygon],
    is_non_zero: bool,
    max_iterations: u32,
) -> HealedExPolygons {
    let fill = if is_non_zero {
        FillRule::NonZero
    } else {
        FillRule::EvenOdd
    };
    let params = HealParams {
        max_iterations,
        ..HealParams::default()
    };
    heal_polygons_with(shape, fill, &params)
}

/// [`heal_polygons`] with explicit parameters.
#[must_use]
pub fn heal_polygons_with(
    shape: &[Polygon],
    fill: FillRule,
    params: &HealParams,
) -> HealedExPolygons {
    // Resolve self-intersections, then merge points closer than the distance.
    let simplified = union_polygons(shape, fill);
    let mut polygons = clean_polygons(&to_polygons(&simplified), params.clean_distance);
    if polygons.is_empty() {
        return HealedExPolygons::default();
    }

    // Overlap every duplicate point by a small square instead of removing it.
    let points = polygons.iter().flat_map(|p| p.points.iter().copied()).collect();
    let duplicates = collect_duplicates(points);
    polygons.extend(duplicates.iter().map(|&d| square_at(&PTS_3X3, d)));

    let mut expolygons = union_polygons(&polygons, fill);
    let is_healed = heal_expolygons_with(&mut expolygons, params);
    HealedExPolygons {
        expolygons,
        is_healed,
    }
}

/// Heals an already built shape in place; returns whether it is fully healed.
pub fn heal_shape(shape: &mut ExPolygons, max_iterations: u32) -> bool {
    for expolygon in shape.iter_mut() {
        expolygon.contour.make_counter_clockwise();
        for hole in &mut expolygon.holes {
            hole.make_clockwise();
        }
    }
    remove_bad(shape);
    heal_expolygons(shape, max_iterations)
}

/// Iteratively removes duplicate points and self-intersections.
pub fn heal_expolygons(shape: &mut ExPolygons, max_iterations: u32) -> bool {
    let params = HealParams {
        max_iterations,
        ..HealParams::default()
    };
    heal_expolygons_with(shape, &params)
}

/// [`heal_expolygons`] with explicit spike parameters.
pub fn heal_expolygons_with(shape: &mut ExPolygons, params: &HealParams) -> bool {
    if shape.is_empty() {
        return true;
    }
    remove_same_neighbor_ex(shape);
    let spike = SpikeDesc::new(params.spike_bevel, params.spike_length);

    // Squares subtracted in the previous round.
    let mut holes = Polygons::new();
    for iteration in 1..params.max_iterations {
        let duplicates = collect_duplicates(to_points(shape));
        let intersections = unique_intersections(
            get_intersection_lines(shape).iter().map(|i| i.point),
        );
        if duplicates.is_empty() && intersections.is_empty() {
            debug!(iteration, "shape healed");
            return true;
        }

        if fill_trouble_holes(&holes, &duplicates, &intersections, shape) {
            holes.clear();
            continue;
        }

        holes.clear();
        remove_spikes_in_duplicates(shape, &duplicates, &spike);
        holes.extend(intersections.iter().map(|&p| square_at(&PTS_2X2, p)));
        holes.extend(duplicates.iter().map(|&p| square_at(&PTS_3X3, p)));
        *shape = diff_polygons_ex(shape, &holes);
    }

    let unhealed = unhealed_expolygons(shape);
    if unhealed.is_empty() {
        return true;
    }
    warn!(
        count = unhealed.len(),
        "Shape can not be healed, replacing by bounding rectangle"
    );
    for index in unhealed {
        if let Some(bb) = bounding_box_of(&shape[index..=index]) {
            shape[index] = create_bounding_rect(&bb);
        }
    }
    false
}

/// Intersection points snapped down to the integer grid, sorted and unique.
#[allow(clippy::cast_possible_truncation)]
fn unique_intersections(points: impl Iterator<Item = Point2>) -> Points {
    let mut result: Points = points
        .map(|p| Point::new(p.x.floor() as i32, p.y.floor() as i32))
        .collect();
    result.sort_unstable();
    result.dedup();
    result
}

fn holes_with_points<'a>(
    holes: &'a [Polygon],
    points: &'a [Point],
) -> impl Iterator<Item = &'a Polygon> {
    holes
        .iter()
        .filter(move |hole| hole.points.iter().any(|h| points.contains(h)))
}

/// Unions back squares subtracted in the previous round when they caused
/// new trouble. Returns `true` when the shape changed.
fn fill_trouble_holes(
    holes: &[Polygon],
    duplicates: &[Point],
    intersections: &[Point],
    shape: &mut ExPolygons,
) -> bool {
    if holes.is_empty() || (duplicates.is_empty() && intersections.is_empty()) {
        return false;
    }
    let fill: Vec<ExPolygon> = holes_with_points(holes, duplicates)
        .chain(holes_with_points(holes, intersections))
        .map(|hole| ExPolygon::new(hole.clone(), vec![]))
        .collect();
    if fill.is_empty() {
        return false;
    }
    *shape = union_two(shape, &fill);
    true
}

/// Indices of expolygons that still contain a duplicate point or a crossing.
#[allow(clippy::cast_possible_truncation)]
fn unhealed_expolygons(shape: &[ExPolygon]) -> Vec<usize> {
    let ids = ExPolygonsIndices::new(shape);
    let points = to_points(shape);
    let mut order: Vec<u32> = (0..points.len() as u32).collect();
    order.sort_by_key(|&i| points[i as usize]);

    let mut is_healed = vec![true; shape.len()];
    for w in order.windows(2) {
        if points[w[0] as usize] == points[w[1] as usize] {
            is_healed[ids.expolygon_of(w[0]) as usize] = false;
            is_healed[ids.expolygon_of(w[1]) as usize] = false;
        }
    }
    for crossing in get_intersection_lines(shape) {
        is_healed[ids.expolygon_of(crossing.line_index1) as usize] = false;
        is_healed[ids.expolygon_of(crossing.line_index2) as usize] = false;
    }
    is_healed
        .iter()
        .enumerate()
        .filter(|(_, ok)| !**ok)
        .map(|(i, _)| i)
        .collect()
}

/// Rectangle with a rectangular hole covering `bb`, at least 10 units wide.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn create_bounding_rect(bb: &BoundingBox) -> ExPolygon {
    let mut bb = *bb;
    let size = bb.size();
    if size.x < 10 {
        bb.max.x += 10;
    }
    if size.y < 10 {
        bb.max.y += 10;
    }
    let size = bb.size();
    let offset = Point::new(
        (f64::from(size.x) * 0.1) as i32,
        (f64::from(size.y) * 0.1) as i32,
    );
    let (min, max) = (bb.min, bb.max);
    let rect = Polygon::new(vec![
        min,
        Point::new(max.x, min.y),
        max,
        Point::new(min.x, max.y),
    ]);
    let hole = Polygon::new(vec![
        min + offset,
        Point::new(min.x + offset.x, max.y - offset.y),
        max - offset,
        Point::new(max.x - offset.x, min.y + offset.y),
    ]);
    ExPolygon::new(rect, vec![hole])
}
