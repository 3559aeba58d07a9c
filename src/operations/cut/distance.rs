//! Choice of one patch depth for every shape outline point.
//!
//! Each outline point of a patch knows the shape point it came from and
//! how far it lies from the ideal projection depth. Starting at the point
//! nearest to the shape center, the choice is propagated along polygons
//! and then to the nearest unfinished expolygon so neighbouring points
//! keep similar depths.

use super::classify::ModelCut;
use super::patch::SurfacePatch;
use super::shape_mesh::ShapeMesh;
use crate::geometry::{ExPolygon, ExPolygonsIndex, ExPolygonsIndices, Point};
use crate::math::line_tree::{Line2, LineTree};
use crate::math::{Point2, Point3};

/// Depth of one patch outline point relative to the ideal projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionDistance {
    pub model_index: usize,
    pub aoi_index: usize,
    pub patch_index: usize,
    /// Signed distance from the ideal depth along the projection.
    pub distance: f64,
}

/// Candidate distances of one shape point.
pub type ProjectionDistances = Vec<ProjectionDistance>;

/// Candidate distances for every flat shape point index.
pub type VDistances = Vec<ProjectionDistances>;

/// Chosen distance for every flat shape point index.
pub type BestDistances = Vec<Option<ProjectionDistance>>;

/// Distance of `p` from the ideal depth of shape point `index`, measured
/// along the dominant axis of the point's front to back segment.
#[must_use]
pub fn calc_distance(p: &Point3, index: u32, shape: &ShapeMesh, ratio: f64) -> f64 {
    let start = shape.front(index);
    let end = shape.back(index);
    let d = end - start;
    let axis = d.iamax();
    (p[axis] - start[axis]) - ratio * d[axis]
}

/// Collects the distances of every tagged outline vertex of every patch.
#[must_use]
pub fn calc_distances(
    patches: &[SurfacePatch],
    cuts: &[ModelCut],
    shape: &ShapeMesh,
    ratio: f64,
) -> VDistances {
    let mut result: VDistances = vec![Vec::new(); shape.count() as usize];
    for (patch_index, patch) in patches.iter().enumerate() {
        let Some(cut) = cuts.get(patch.model_id) else {
            continue;
        };
        for &v in patch.loops.iter().flatten() {
            let Some(element) = patch.source[v].and_then(|source| cut.tags[source]) else {
                continue;
            };
            let index = element.shape_point_index;
            let Some(candidates) = result.get_mut(index as usize) else {
                continue;
            };
            candidates.push(ProjectionDistance {
                model_index: patch.model_id,
                aoi_index: patch.aoi_id,
                patch_index,
                distance: calc_distance(patch.mesh.point(v), index, shape, ratio),
            });
        }
    }
    result
}

/// Shape point of a structured address.
fn point_at(shapes: &[ExPolygon], id: &ExPolygonsIndex) -> Point {
    let shape = &shapes[id.expolygons_index as usize];
    let polygon = if id.polygon_index == 0 {
        &shape.contour
    } else {
        &shape.holes[id.polygon_index as usize - 1]
    };
    polygon.points[id.point_index as usize]
}

fn to_point2(p: Point) -> Point2 {
    Point2::new(f64::from(p.x), f64::from(p.y))
}

/// Squared length in floating point; integer products may overflow.
fn size_sq(a: Point, b: Point) -> f64 {
    let dx = f64::from(a.x) - f64::from(b.x);
    let dy = f64::from(a.y) - f64::from(b.y);
    dx * dx + dy * dy
}

/// Segments between consecutive masked points with the flat index of
/// each segment's end point.
#[derive(Debug)]
pub struct SearchData {
    pub tree: LineTree,
    pub line_to_point: Vec<u32>,
}

/// Builds segments between neighbouring masked shape points.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn create_search_data(shapes: &[ExPolygon], mask: &[bool]) -> SearchData {
    let mut lines = Vec::with_capacity(mask.len());
    let mut line_to_point = Vec::with_capacity(mask.len());
    let mut index = 0_usize;
    for polygon in shapes.iter().flat_map(ExPolygon::polygons) {
        let Some(&last) = polygon.points.last() else {
            continue;
        };
        let mut prev = to_point2(last);
        let mut use_point = mask[index + polygon.len() - 1];
        for &p in &polygon.points {
            if !use_point {
                use_point = mask[index];
                if use_point {
                    prev = to_point2(p);
                }
            } else if !mask[index] {
                use_point = false;
            } else {
                let current = to_point2(p);
                lines.push(Line2::new(prev, current));
                line_to_point.push(index as u32);
                prev = current;
            }
            index += 1;
        }
    }
    SearchData {
        tree: LineTree::new(lines),
        line_to_point,
    }
}

/// End point of line `line_index` nearer to `hit` along the line's
/// dominant axis.
#[must_use]
pub fn get_closest_point_index(
    data: &SearchData,
    line_index: usize,
    hit: &Point2,
    s2i: &ExPolygonsIndices,
) -> u32 {
    let line = &data.tree.lines()[line_index];
    let dir = line.a - line.b;
    let axis = usize::from(dir.x.abs() <= dir.y.abs());
    let point_index = data.line_to_point[line_index];
    if (line.a[axis] - hit[axis]).abs() > (line.b[axis] - hit[axis]).abs() {
        point_index
    } else {
        s2i.prev_in_polygon(point_index)
    }
}

/// Masked shape point nearest to `p`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn find_closest_point_index(
    p: Point,
    shapes: &[ExPolygon],
    s2i: &ExPolygonsIndices,
    mask: &[bool],
) -> Option<u32> {
    let data = create_search_data(shapes, mask);
    if let Some(closest) = data.tree.closest(&to_point2(p)) {
        return Some(get_closest_point_index(&data, closest.line_index, &closest.point, s2i));
    }
    // Isolated points only.
    let mut best: Option<(f64, u32)> = None;
    for (i, _) in mask.iter().enumerate().filter(|(_, &m)| m) {
        let index = i as u32;
        let d = size_sq(p, point_at(shapes, &s2i.to_index(index)));
        if best.is_none_or(|(bd, _)| d < bd) {
            best = Some((d, index));
        }
    }
    best.map(|(_, index)| index)
}

/// Flat index range of expolygon `shape_index`.
fn shape_range(
    shapes: &[ExPolygon],
    s2i: &ExPolygonsIndices,
    shape_index: usize,
) -> std::ops::Range<usize> {
    #[allow(clippy::cast_possible_truncation)]
    let first = s2i.to_flat(&ExPolygonsIndex {
        expolygons_index: shape_index as u32,
        polygon_index: 0,
        point_index: 0,
    }) as usize;
    first..first + shapes[shape_index].num_points()
}

/// Closest pair of a finished point and an unfinished point, as
/// `(finished, unfinished)` flat indices.
#[must_use]
pub fn find_closest_point_pair(
    shapes: &[ExPolygon],
    done_shapes: &[bool],
    s2i: &ExPolygonsIndices,
    mask: &[bool],
) -> Option<(u32, u32)> {
    let mut unfinished_mask = mask.to_vec();
    let mut finished = Vec::new();
    for (shape_index, _) in done_shapes.iter().enumerate().filter(|(_, &done)| done) {
        if shapes[shape_index].num_points() == 0 {
            continue;
        }
        let range = shape_range(shapes, s2i, shape_index);
        finished.extend(range.clone().filter(|&i| mask[i]));
        for m in &mut unfinished_mask[range] {
            *m = false;
        }
    }
    closest_pair(shapes, s2i, &finished, &unfinished_mask)
}

/// Nearest pair between `finished` points and points set in
/// `unfinished_mask`, searched through the segments of the unfinished ones.
#[allow(clippy::cast_possible_truncation)]
fn closest_pair(
    shapes: &[ExPolygon],
    s2i: &ExPolygonsIndices,
    finished: &[usize],
    unfinished_mask: &[bool],
) -> Option<(u32, u32)> {
    let data = create_search_data(shapes, unfinished_mask);

    // Unfinished shapes without segments are compared point to point.
    let nearest = |p: Point| -> Option<(f64, u32)> {
        if let Some(closest) = data.tree.closest(&to_point2(p)) {
            let index = get_closest_point_index(&data, closest.line_index, &closest.point, s2i);
            return Some((closest.distance_sq, index));
        }
        unfinished_mask
            .iter()
            .enumerate()
            .filter(|(_, &m)| m)
            .map(|(j, _)| {
                let j = j as u32;
                (size_sq(p, point_at(shapes, &s2i.to_index(j))), j)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
    };

    let mut best: Option<(f64, u32, u32)> = None;
    for &index in finished {
        let index = index as u32;
        let Some((d, unfinished)) = nearest(point_at(shapes, &s2i.to_index(index))) else {
            continue;
        };
        if best.is_none_or(|(bd, _, _)| d < bd) {
            best = Some((d, index, unfinished));
        }
    }
    best.map(|(_, finished, unfinished)| (finished, unfinished))
}

/// Candidate nearest to `wanted`; the first one wins ties.
#[must_use]
pub fn get_closest_projection(
    candidates: &[ProjectionDistance],
    wanted: f64,
) -> Option<&ProjectionDistance> {
    let mut best: Option<(f64, &ProjectionDistance)> = None;
    for pd in candidates {
        let d = (pd.distance - wanted).abs();
        if best.is_none_or(|(bd, _)| d < bd) {
            best = Some((d, pd));
        }
    }
    best.map(|(_, pd)| pd)
}

/// Propagates `pd` from point `index` around its polygon, forward and then
/// backward, until a point without candidates stops the walk.
pub fn fill_polygon_distances(
    pd: &ProjectionDistance,
    index: u32,
    id: &ExPolygonsIndex,
    polygon_len: u32,
    result: &mut BestDistances,
    distances: &VDistances,
) {
    let first = index - id.point_index;
    let last = first + polygon_len;
    result[index as usize] = Some(*pd);

    let mut step = |from_distance: f64, to: u32| -> Option<f64> {
        let next = get_closest_projection(&distances[to as usize], from_distance)?;
        result[to as usize] = Some(*next);
        Some(next.distance)
    };

    let finish = if index == first { last - 1 } else { index - 1 };
    let mut act = index;
    let mut act_distance = pd.distance;
    while act != finish {
        let next = if act + 1 == last { first } else { act + 1 };
        let Some(d) = step(act_distance, next) else {
            break;
        };
        act = next;
        act_distance = d;
    }
    if act == finish {
        return;
    }

    act = index;
    act_distance = pd.distance;
    loop {
        let next = if act == first { last - 1 } else { act - 1 };
        if next == index {
            break;
        }
        let Some(d) = step(act_distance, next) else {
            break;
        };
        act = next;
        act_distance = d;
    }
}

/// Fills every polygon of one expolygon, continuing each time from the
/// unfinished point nearest to an already finished one.
#[allow(clippy::cast_possible_truncation)]
pub fn fill_shape_distances(
    start_index: u32,
    start_pd: &ProjectionDistance,
    result: &mut BestDistances,
    s2i: &ExPolygonsIndices,
    shapes: &[ExPolygon],
    distances: &VDistances,
) {
    let shape_index = s2i.expolygon_of(start_index) as usize;
    let range = shape_range(shapes, s2i, shape_index);

    let mut start = start_index;
    let mut pd = *start_pd;
    loop {
        let id = s2i.to_index(start);
        let first = start - id.point_index;
        let polygon_len = s2i.prev_in_polygon(first) - first + 1;
        fill_polygon_distances(&pd, start, &id, polygon_len, result, distances);

        // Nearest pair of unfinished point with candidates and finished point.
        let mut unfinished_mask = vec![false; distances.len()];
        let mut finished = Vec::new();
        for i in range.clone() {
            if result[i].is_some() {
                finished.push(i);
            } else {
                unfinished_mask[i] = !distances[i].is_empty();
            }
        }
        let Some((finished, unfinished)) = closest_pair(shapes, s2i, &finished, &unfinished_mask)
        else {
            break;
        };
        let (finished, unfinished) = (finished as usize, unfinished as usize);
        let wanted = result[finished].map_or(pd.distance, |f| f.distance);
        let Some(next) = get_closest_projection(&distances[unfinished], wanted) else {
            break;
        };
        start = unfinished as u32;
        pd = *next;
    }
}

/// Chooses one distance per shape point.
///
/// `start` seeds the walk, usually the center of the shapes' bounding box.
/// Expolygons touched by a single patch copy that patch's distances.
#[must_use]
pub fn choose_best_distance(
    distances: &VDistances,
    shapes: &[ExPolygon],
    start: Point,
    s2i: &ExPolygonsIndices,
    patches: &[SurfacePatch],
) -> BestDistances {
    let mut shapes_patches: Vec<Vec<usize>> = vec![Vec::new(); shapes.len()];
    for (patch_index, patch) in patches.iter().enumerate() {
        if let Some(list) = shapes_patches.get_mut(patch.shape_id as usize) {
            list.push(patch_index);
        }
    }

    let mut result: BestDistances = vec![None; distances.len()];
    let mut finished = vec![false; shapes.len()];
    let mask: Vec<bool> = distances.iter().map(|d| !d.is_empty()).collect();

    let Some(mut unfinished) = find_closest_point_index(start, shapes, s2i, &mask) else {
        return result;
    };
    let mut wanted = 0.0;
    loop {
        let Some(pd) = get_closest_projection(&distances[unfinished as usize], wanted).copied()
        else {
            break;
        };
        let shape_index = s2i.expolygon_of(unfinished) as usize;
        if shapes_patches[shape_index].len() == 1 {
            for i in shape_range(shapes, s2i, shape_index) {
                let Some(first) = distances[i].first() else {
                    continue;
                };
                // A patch may reach one point several times.
                let mut best = *first;
                for candidate in &distances[i][1..] {
                    if (candidate.distance - pd.distance).abs()
                        < (best.distance - pd.distance).abs()
                    {
                        best = *candidate;
                    }
                }
                result[i] = Some(best);
            }
        } else {
            fill_shape_distances(unfinished, &pd, &mut result, s2i, shapes, distances);
        }
        finished[shape_index] = true;

        let Some((done, next)) = find_closest_point_pair(shapes, &finished, s2i, &mask) else {
            break;
        };
        let Some(done_pd) = result[done as usize] else {
            break;
        };
        wanted = done_pd.distance;
        unfinished = next;
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::operations::projection::ProjectZ;

    fn pt(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    fn square(x0: i32, y0: i32, size: i32) -> ExPolygon {
        let pts = [(0, 0), (size, 0), (size, size), (0, size)].map(|(x, y)| pt(x0 + x, y0 + y));
        ExPolygon::new(Polygon::new(pts.to_vec()), vec![])
    }

    fn pd(patch_index: usize, distance: f64) -> ProjectionDistance {
        ProjectionDistance {
            model_index: 0,
            aoi_index: patch_index,
            patch_index,
            distance,
        }
    }

    fn patch_with_shape(shape_id: u32) -> SurfacePatch {
        let mut patch = SurfacePatch::new(
            crate::topology::HalfEdgeMesh::from_triangles(Vec::new(), &[]),
            crate::topology::PropertyMap::from_vec(Vec::new()),
        );
        patch.shape_id = shape_id;
        patch
    }

    // ── distance ──

    #[test]
    fn distance_is_relative_to_ideal_depth() {
        let shapes = vec![square(0, 0, 10)];
        let shape = ShapeMesh::new(&shapes, &ProjectZ::new(5.0)).unwrap();
        let d = calc_distance(&Point3::new(0.0, 0.0, 2.0), 0, &shape, 0.5);
        assert!((d - (2.0 - 2.5)).abs() < 1e-12);
        let d = calc_distance(&Point3::new(0.0, 0.0, 2.0), 0, &shape, 0.0);
        assert!((d - 2.0).abs() < 1e-12);
    }

    // ── search ──

    #[test]
    fn closest_point_by_segments() {
        let shapes = vec![square(0, 0, 10), square(20, 0, 10)];
        let s2i = ExPolygonsIndices::new(&shapes);
        let mask = vec![true; 8];
        assert_eq!(find_closest_point_index(pt(11, 1), &shapes, &s2i, &mask), Some(1));
        assert_eq!(find_closest_point_index(pt(19, 9), &shapes, &s2i, &mask), Some(7));
    }

    #[test]
    fn isolated_points_use_brute_force() {
        let shapes = vec![square(0, 0, 10)];
        let s2i = ExPolygonsIndices::new(&shapes);
        let mask = [false, true, false, true];
        assert_eq!(find_closest_point_index(pt(1, 9), &shapes, &s2i, &mask), Some(3));
    }

    #[test]
    fn closest_pair_links_finished_and_unfinished() {
        let shapes = vec![square(0, 0, 10), square(30, 0, 10), square(12, 0, 10)];
        let s2i = ExPolygonsIndices::new(&shapes);
        let mask = vec![true; 12];
        let (done, next) =
            find_closest_point_pair(&shapes, &[true, false, false], &s2i, &mask).unwrap();
        assert!(done == 1 || done == 2);
        assert!(next == 8 || next == 11);
        assert!(find_closest_point_pair(&shapes, &[true; 3], &s2i, &mask).is_none());
    }

    #[test]
    fn closest_projection_prefers_first_on_tie() {
        let candidates = [pd(0, 1.0), pd(1, -1.0), pd(2, 3.0)];
        assert_eq!(get_closest_projection(&candidates, 0.0).unwrap().patch_index, 0);
        assert_eq!(get_closest_projection(&candidates, 2.5).unwrap().patch_index, 2);
        assert!(get_closest_projection(&[], 0.0).is_none());
    }

    // ── propagation ──

    #[test]
    fn polygon_walk_follows_neighbour_depth() {
        let shapes = vec![square(0, 0, 10)];
        let s2i = ExPolygonsIndices::new(&shapes);
        let distances: VDistances = vec![
            vec![pd(0, 0.0), pd(1, 5.0)],
            vec![pd(0, 0.4), pd(1, 4.0)],
            vec![pd(0, 3.5), pd(1, 2.0)],
            vec![pd(0, 6.0), pd(1, 3.0)],
        ];
        let mut result = vec![None; 4];
        fill_polygon_distances(&distances[0][0], 0, &s2i.to_index(0), 4, &mut result, &distances);
        let chosen: Vec<usize> = result.iter().map(|r| r.unwrap().patch_index).collect();
        // 0.0 -> 0.4 -> 2.0 -> 3.0 keeps hopping to the nearer depth.
        assert_eq!(chosen, vec![0, 0, 1, 1]);
    }

    #[test]
    fn gap_stops_walk_in_both_directions() {
        let shapes = vec![square(0, 0, 10)];
        let s2i = ExPolygonsIndices::new(&shapes);
        let distances: VDistances =
            vec![vec![pd(0, 0.0)], vec![pd(0, 0.0)], vec![], vec![pd(0, 1.0)]];
        let mut result = vec![None; 4];
        fill_polygon_distances(&distances[0][0], 0, &s2i.to_index(0), 4, &mut result, &distances);
        assert!(result[0].is_some() && result[1].is_some() && result[3].is_some());
        assert!(result[2].is_none());
    }

    #[test]
    fn hole_walk_starts_next_to_finished_contour() {
        let mut shape = square(0, 0, 30);
        shape.holes.push(Polygon::new(vec![pt(22, 4), pt(22, 12), pt(26, 12), pt(26, 4)]));
        let shapes = vec![shape];
        let s2i = ExPolygonsIndices::new(&shapes);
        let mut distances: VDistances = vec![vec![pd(0, 0.0)]; 4];
        distances.extend([
            vec![pd(0, 3.0), pd(1, 0.5)],
            vec![pd(0, 0.4), pd(1, 5.0)],
            vec![pd(0, 0.3), pd(1, 4.0)],
            vec![pd(0, 0.2), pd(1, 5.0)],
        ]);
        let mut result = vec![None; 8];
        fill_shape_distances(0, &distances[0][0], &mut result, &s2i, &shapes, &distances);
        let chosen: Vec<usize> = result.iter().map(|r| r.unwrap().patch_index).collect();
        // Hole corner (26, 4) is nearest to the contour and seeds the hole walk.
        assert_eq!(chosen, vec![0, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn single_patch_copies_its_distances() {
        let shapes = vec![square(0, 0, 10)];
        let s2i = ExPolygonsIndices::new(&shapes);
        let distances: VDistances = vec![
            vec![pd(0, 0.3)],
            vec![pd(0, -0.2)],
            vec![pd(0, 1.5), pd(0, 0.1)],
            vec![pd(0, 0.7)],
        ];
        let best =
            choose_best_distance(&distances, &shapes, pt(5, 5), &s2i, &[patch_with_shape(0)]);
        let values: Vec<f64> = best.iter().map(|b| b.unwrap().distance).collect();
        // Point 2 takes the candidate nearest to the seed depth.
        assert_eq!(values, vec![0.3, -0.2, 0.1, 0.7]);
    }

    #[test]
    fn choice_spreads_to_other_shapes() {
        let shapes = vec![square(0, 0, 10), square(15, 0, 10)];
        let s2i = ExPolygonsIndices::new(&shapes);
        let mut distances: VDistances = vec![Vec::new(); 8];
        for d in &mut distances[..4] {
            *d = vec![pd(0, 0.5), pd(1, 3.0)];
        }
        for d in &mut distances[4..] {
            *d = vec![pd(2, 2.8), pd(3, 0.6)];
        }
        let patches: Vec<SurfacePatch> = [0, 0, 1, 1].into_iter().map(patch_with_shape).collect();
        let best = choose_best_distance(&distances, &shapes, pt(12, 5), &s2i, &patches);
        assert!(best[..4].iter().all(|b| b.unwrap().patch_index == 0));
        assert!(best[4..].iter().all(|b| b.unwrap().patch_index == 3));
    }
}
