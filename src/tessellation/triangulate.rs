use std::collections::{HashMap, HashSet, VecDeque};

use spade::handles::{FixedDirectedEdgeHandle, FixedFaceHandle, FixedVertexHandle, InnerTag};
use spade::{
    ConstrainedDelaunayTriangulation, InsertionError, Point2 as SpadePoint2, Triangulation,
};

use crate::error::{Result, TessellationError};
use crate::geometry::polygon::to_points;
use crate::geometry::ExPolygon;
use crate::math::Point2;

type Cdt = ConstrainedDelaunayTriangulation<SpadePoint2<f64>>;

/// Constrained Delaunay triangulation of a planar region.
///
/// `boundary` segments enclose the region (outer loops and holes); `chords`
/// are extra segments the triangulation must contain without changing what
/// is inside. Triangles are counter-clockwise and index `points`.
///
/// # Errors
///
/// Fails when two points coincide, when a point can not be inserted, or
/// when a segment crosses an already inserted one.
#[allow(clippy::cast_possible_truncation)]
pub fn triangulate_region(
    points: &[Point2],
    boundary: &[(u32, u32)],
    chords: &[(u32, u32)],
) -> Result<Vec<[u32; 3]>> {
    let mut cdt = Cdt::new();
    let mut handles = Vec::with_capacity(points.len());
    let mut to_input: HashMap<usize, u32> = HashMap::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        let h = cdt
            .insert(SpadePoint2::new(p.x, p.y))
            .map_err(|e: InsertionError| TessellationError::Failed(format!("CDT insert: {e}")))?;
        if to_input.insert(h.index(), i as u32).is_some() {
            return Err(TessellationError::Failed(format!("duplicate point {i}")).into());
        }
        handles.push(h);
    }

    let key = |a: u32, b: u32| {
        let (i, j) = (handles[a as usize].index(), handles[b as usize].index());
        (i.min(j), i.max(j))
    };
    let mut added: HashSet<(usize, usize)> = HashSet::with_capacity(boundary.len() + chords.len());
    for &(a, b) in boundary.iter().chain(chords) {
        let (from, to) = (handles[a as usize], handles[b as usize]);
        if from == to || !added.insert(key(a, b)) {
            continue;
        }
        if !cdt.can_add_constraint(from, to) {
            return Err(TessellationError::Failed(format!("crossing constraint {a}-{b}")).into());
        }
        cdt.add_constraint(from, to);
    }
    let walls: HashSet<(usize, usize)> = boundary.iter().map(|&(a, b)| key(a, b)).collect();

    let interior = classify_interior_faces(&cdt, |from, to| {
        walls.contains(&(from.index().min(to.index()), from.index().max(to.index())))
    });

    let mut triangles = Vec::with_capacity(interior.len());
    for face in cdt.inner_faces() {
        if !interior.contains(&face.fix().index()) {
            continue;
        }
        let mut tri = [0_u32; 3];
        for (slot, vh) in tri.iter_mut().zip(face.vertices()) {
            let Some(&input) = to_input.get(&vh.fix().index()) else {
                return Err(TessellationError::Failed("unknown CDT vertex".into()).into());
            };
            *slot = input;
        }
        triangles.push(tri);
    }
    Ok(triangles)
}

/// Triangulates expolygons over their flattened points (contour first,
/// then holes, per expolygon).
///
/// # Errors
///
/// Fails on coincident points or crossing rings; healed shapes have neither.
#[allow(clippy::cast_possible_truncation)]
pub fn triangulate_expolygons(expolygons: &[ExPolygon]) -> Result<Vec<[u32; 3]>> {
    let points: Vec<Point2> = to_points(expolygons).iter().map(|p| p.to_f64()).collect();
    let mut boundary = Vec::with_capacity(points.len());
    let mut offset = 0_u32;
    for polygon in expolygons.iter().flat_map(ExPolygon::polygons) {
        let n = polygon.len() as u32;
        for i in 0..n {
            boundary.push((offset + i, offset + (i + 1) % n));
        }
        offset += n;
    }
    triangulate_region(&points, &boundary, &[])
}

/// Faces inside the region, found by flooding from the outer face and
/// flipping parity at every boundary edge.
fn classify_interior_faces(
    cdt: &Cdt,
    is_boundary: impl Fn(FixedVertexHandle, FixedVertexHandle) -> bool,
) -> HashSet<usize> {
    let mut interior = HashSet::new();
    let mut depth_map: HashMap<usize, u32> = HashMap::new();
    let mut queue: VecDeque<(FixedFaceHandle<InnerTag>, u32)> = VecDeque::new();
    let crosses = |fix: FixedDirectedEdgeHandle| {
        let edge = cdt.directed_edge(fix);
        cdt.is_constraint_edge(edge.as_undirected().fix())
            && is_boundary(edge.from().fix(), edge.to().fix())
    };

    let outer_fix = cdt.outer_face().fix();
    for edge in cdt.directed_edges() {
        if edge.face().fix() != outer_fix {
            continue;
        }
        let Some(inner) = edge.rev().face().as_inner() else {
            continue;
        };
        let idx = inner.fix().index();
        if depth_map.contains_key(&idx) {
            continue;
        }
        let depth = u32::from(crosses(edge.fix()));
        depth_map.insert(idx, depth);
        if depth % 2 == 1 {
            interior.insert(idx);
        }
        queue.push_back((inner.fix(), depth));
    }

    while let Some((face_fix, depth)) = queue.pop_front() {
        let face = cdt.face(face_fix);
        for edge in face.adjacent_edges() {
            let Some(neighbor) = edge.rev().face().as_inner() else {
                continue;
            };
            let n_idx = neighbor.fix().index();
            if depth_map.contains_key(&n_idx) {
                continue;
            }
            let new_depth = if crosses(edge.fix()) { depth + 1 } else { depth };
            depth_map.insert(n_idx, new_depth);
            if new_depth % 2 == 1 {
                interior.insert(n_idx);
            }
            queue.push_back((neighbor.fix(), new_depth));
        }
    }

    interior
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn pt(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    fn area(points: &[Point2], tris: &[[u32; 3]]) -> f64 {
        tris.iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| points[i as usize]);
                ((b - a).perp(&(c - a))) / 2.0
            })
            .sum()
    }

    fn ring(n: u32) -> Vec<(u32, u32)> {
        (0..n).map(|i| (i, (i + 1) % n)).collect()
    }

    // ── region ──

    #[test]
    fn square_gives_two_ccw_triangles() {
        let pts = [p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)];
        let tris = triangulate_region(&pts, &ring(4), &[]).unwrap();
        assert_eq!(tris.len(), 2);
        for t in &tris {
            let [a, b, c] = t.map(|i| pts[i as usize]);
            assert!((b - a).perp(&(c - a)) > 0.0);
        }
    }

    #[test]
    fn concave_region_excludes_notch() {
        let pts = [
            p(0.0, 0.0),
            p(2.0, 0.0),
            p(2.0, 2.0),
            p(1.0, 1.0),
            p(0.0, 2.0),
        ];
        let tris = triangulate_region(&pts, &ring(5), &[]).unwrap();
        assert_eq!(tris.len(), 3);
        assert!((area(&pts, &tris) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn chord_is_kept_without_changing_inside() {
        // Square with a midpoint on the bottom and one inside.
        let pts = [
            p(0.0, 0.0),
            p(1.0, 0.0),
            p(2.0, 0.0),
            p(2.0, 2.0),
            p(0.0, 2.0),
            p(1.0, 1.0),
        ];
        let tris = triangulate_region(&pts, &ring(5), &[(1, 5), (5, 3)]).unwrap();
        assert!((area(&pts, &tris) - 4.0).abs() < 1e-12);
        let has_edge = |a: u32, b: u32| {
            tris.iter()
                .any(|t| (0..3).any(|i| t[i] == a && t[(i + 1) % 3] == b))
        };
        assert!(has_edge(1, 5) || has_edge(5, 1));
        assert!(has_edge(5, 3) || has_edge(3, 5));
    }

    #[test]
    fn duplicate_point_fails() {
        let pts = [p(0.0, 0.0), p(1.0, 0.0), p(0.0, 0.0), p(0.0, 1.0)];
        assert!(triangulate_region(&pts, &ring(4), &[]).is_err());
    }

    #[test]
    fn crossing_chord_fails() {
        let pts = [p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)];
        assert!(triangulate_region(&pts, &ring(4), &[(0, 2), (1, 3)]).is_err());
    }

    // ── expolygons ──

    #[test]
    fn expolygon_hole_is_excluded() {
        let shape = ExPolygon::new(
            Polygon::new(vec![pt(0, 0), pt(10, 0), pt(10, 10), pt(0, 10)]),
            vec![Polygon::new(vec![pt(3, 3), pt(3, 7), pt(7, 7), pt(7, 3)])],
        );
        let tris = triangulate_expolygons(std::slice::from_ref(&shape)).unwrap();
        assert_eq!(tris.len(), 8);
        let pts: Vec<Point2> = to_points(&[shape]).iter().map(|q| q.to_f64()).collect();
        assert!((area(&pts, &tris) - 84.0).abs() < 1e-9);
    }
}
