//! Face classification of a corefined model and extraction of the areas
//! lying inside the projected shapes.

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::corefine::corefine;
use super::shape_mesh::{ElementKind, IntersectingElement, ShapeMesh};
use crate::math::predicates::{orient3d, Orientation};
use crate::topology::{EdgeId, FaceId, HalfEdgeId, HalfEdgeMesh, PropertyMap, VertexId};

/// Side of a face relative to the projected shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceType {
    /// Not touching any wall; decided by flood fill.
    NotConstrained,
    Inside,
    Outside,
    /// Inside face already collected into an area of interest.
    InsideProcessed,
}

/// Connected inside region of one model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CutAoi {
    pub faces: Vec<FaceId>,
    /// Half-edges of the region whose neighbour is outside or missing.
    pub outline: Vec<HalfEdgeId>,
}

/// Model refined by the shape walls with its areas of interest.
#[derive(Debug, Clone)]
pub struct ModelCut {
    pub mesh: HalfEdgeMesh,
    pub tags: PropertyMap<VertexId, Option<IntersectingElement>>,
    pub constrained: PropertyMap<EdgeId, bool>,
    pub aois: Vec<CutAoi>,
}

impl ModelCut {
    /// Model that takes no part in the cut.
    #[must_use]
    pub fn untouched(mesh: HalfEdgeMesh) -> Self {
        Self {
            tags: PropertyMap::new(mesh.n_vertices(), None),
            constrained: PropertyMap::new(mesh.n_edges(), false),
            aois: Vec::new(),
            mesh,
        }
    }
}

/// Decides whether the face left of constrained half-edge `h` lies inside
/// the shape. Returns `None` when an end point has no wall element.
#[must_use]
pub fn is_face_inside(
    mesh: &HalfEdgeMesh,
    tags: &PropertyMap<VertexId, Option<IntersectingElement>>,
    shape: &ShapeMesh,
    h: HalfEdgeId,
) -> Option<bool> {
    let from = tags[mesh.source(h)]?;
    let to = tags[mesh.target(h)]?;
    let (i_from, i_to) = (from.shape_point_index, to.shape_point_index);

    if i_from == i_to && from.kind == to.kind {
        let j = shape.next(i_from);
        let p = mesh.point(mesh.target(mesh.next(h)));
        let orientation = match from.kind {
            ElementKind::Edge1 | ElementKind::Face1 => {
                orient3d(&shape.front(i_from), &shape.back(i_from), &shape.front(j), p)
            }
            ElementKind::Edge2 | ElementKind::Face2 => {
                orient3d(&shape.front(j), &shape.back(i_from), &shape.back(j), p)
            }
        };
        return Some(orientation == Orientation::Positive);
    }
    if i_from < i_to || (i_from == i_to && from.kind < to.kind) {
        let wraps = to.is_last && from.is_first;
        debug_assert!(i_from == i_to || wraps || i_from + 1 == i_to);
        Some(!wraps)
    } else {
        let wraps = to.is_first && from.is_last;
        debug_assert!(i_from == i_to || wraps || i_to + 1 == i_from);
        Some(wraps)
    }
}

/// Types the two faces of every constrained edge.
#[must_use]
pub fn set_face_type(
    mesh: &HalfEdgeMesh,
    tags: &PropertyMap<VertexId, Option<IntersectingElement>>,
    constrained: &PropertyMap<EdgeId, bool>,
    shape: &ShapeMesh,
) -> PropertyMap<FaceId, FaceType> {
    let mut types = PropertyMap::new(mesh.n_faces(), FaceType::NotConstrained);
    for (e, &is_constrained) in constrained.iter() {
        if !is_constrained {
            continue;
        }
        let h = mesh.edge_halfedge(e);
        let Some(inside) = is_face_inside(mesh, tags, shape, h) else {
            continue;
        };
        let (near, far) = if inside {
            (FaceType::Inside, FaceType::Outside)
        } else {
            (FaceType::Outside, FaceType::Inside)
        };
        types[mesh.face(h)] = near;
        if let Some(f) = mesh.opposite_face(h) {
            types[f] = far;
        }
    }
    types
}

fn has_inside_neighbor(
    mesh: &HalfEdgeMesh,
    types: &PropertyMap<FaceId, FaceType>,
    f: FaceId,
) -> bool {
    mesh.face_halfedges(f)
        .into_iter()
        .filter_map(|h| mesh.opposite_face(h))
        .any(|n| types[n] == FaceType::Inside)
}

/// Spreads `Inside` over unconstrained regions touching an inside face.
pub fn flood_fill_inner(mesh: &HalfEdgeMesh, types: &mut PropertyMap<FaceId, FaceType>) {
    let mut stack: Vec<FaceId> = Vec::with_capacity(128);
    for f in mesh.faces() {
        if types[f] != FaceType::NotConstrained || !has_inside_neighbor(mesh, types, f) {
            continue;
        }
        stack.push(f);
        while let Some(current) = stack.pop() {
            if types[current] == FaceType::Inside {
                continue;
            }
            types[current] = FaceType::Inside;
            for h in mesh.face_halfedges(current) {
                if let Some(n) = mesh.opposite_face(h) {
                    if types[n] == FaceType::NotConstrained {
                        stack.push(n);
                    }
                }
            }
        }
    }
}

/// Collects the inside region reachable from the faces in `queue`.
fn collect_surface_data(
    mesh: &HalfEdgeMesh,
    types: &mut PropertyMap<FaceId, FaceType>,
    queue: &mut VecDeque<FaceId>,
) -> CutAoi {
    let mut aoi = CutAoi::default();
    while let Some(f) = queue.pop_front() {
        if types[f] == FaceType::InsideProcessed {
            continue;
        }
        types[f] = FaceType::InsideProcessed;
        aoi.faces.push(f);
        for h in mesh.face_halfedges(f) {
            let Some(n) = mesh.opposite_face(h) else {
                aoi.outline.push(h);
                continue;
            };
            match types[n] {
                FaceType::Inside => queue.push_back(n),
                FaceType::Outside => aoi.outline.push(h),
                FaceType::NotConstrained | FaceType::InsideProcessed => {}
            }
        }
    }
    aoi
}

/// Splits the inside faces into connected areas of interest.
#[must_use]
pub fn create_cut_area_of_interests(
    mesh: &HalfEdgeMesh,
    types: &mut PropertyMap<FaceId, FaceType>,
) -> Vec<CutAoi> {
    let mut result = Vec::new();
    let mut queue = VecDeque::new();
    for f in mesh.faces() {
        if types[f] != FaceType::Inside {
            continue;
        }
        queue.push_back(f);
        result.push(collect_surface_data(mesh, types, &mut queue));
    }
    result
}

/// Refines `model` along the shape walls and extracts its areas of
/// interest. An unusable refinement leaves the model without areas.
#[must_use]
pub fn cut_from_model(model: HalfEdgeMesh, shape: &ShapeMesh, model_index: usize) -> ModelCut {
    let corefined = match corefine(&model, shape) {
        Ok(c) => c,
        Err(anomaly) => {
            warn!(model_index, %anomaly, "corefinement rejected, model gives no cut");
            return ModelCut::untouched(model);
        }
    };
    let mut types = set_face_type(&corefined.mesh, &corefined.tags, &corefined.constrained, shape);
    flood_fill_inner(&corefined.mesh, &mut types);
    let aois = create_cut_area_of_interests(&corefined.mesh, &mut types);
    debug!(
        model_index,
        faces = corefined.mesh.n_faces(),
        aois = aois.len(),
        "model cut"
    );
    ModelCut {
        mesh: corefined.mesh,
        tags: corefined.tags,
        constrained: corefined.constrained,
        aois,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{ExPolygon, Point, Polygon};
    use crate::math::Point3;
    use crate::operations::projection::ProjectZ;

    fn pt(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn square(x0: i32, y0: i32, size: i32) -> ExPolygon {
        ExPolygon::new(
            Polygon::new(vec![
                pt(x0, y0),
                pt(x0 + size, y0),
                pt(x0 + size, y0 + size),
                pt(x0, y0 + size),
            ]),
            vec![],
        )
    }

    fn plane(z: f64) -> HalfEdgeMesh {
        HalfEdgeMesh::from_triangles(
            vec![p(-10.0, -10.0, z), p(10.0, -10.0, z), p(10.0, 10.0, z), p(-10.0, 10.0, z)],
            &[[0, 1, 3], [1, 2, 3]],
        )
    }

    fn aoi_area(cut: &ModelCut, aoi: &CutAoi) -> f64 {
        aoi.faces
            .iter()
            .map(|&f| {
                let [a, b, c] = cut.mesh.face_points(f);
                (b - a).cross(&(c - a)).norm() / 2.0
            })
            .sum()
    }

    // ── inside test ──

    #[test]
    fn index_order_decides_side() {
        let shape = ShapeMesh::new(&[square(0, 0, 10)], &ProjectZ::new(5.0)).unwrap();
        let mesh = HalfEdgeMesh::from_triangles(
            vec![p(2.0, 0.0, 2.0), p(10.0, 3.0, 2.0), p(5.0, 5.0, 2.0)],
            &[[0, 1, 2]],
        );
        let mut tags = PropertyMap::new(3, None);
        tags[VertexId::new(0)] = Some(shape.element(0, ElementKind::Face1));
        tags[VertexId::new(1)] = Some(shape.element(1, ElementKind::Face1));
        let h = mesh.find_halfedge(VertexId::new(0), VertexId::new(1)).unwrap();
        assert_eq!(is_face_inside(&mesh, &tags, &shape, h), Some(true));
        let back = HalfEdgeMesh::from_triangles(mesh.points().to_vec(), &[[1, 0, 2]]);
        let h = back.find_halfedge(VertexId::new(1), VertexId::new(0)).unwrap();
        assert_eq!(is_face_inside(&back, &tags, &shape, h), Some(false));
    }

    #[test]
    fn wrap_around_reverses_order() {
        let shape = ShapeMesh::new(&[square(0, 0, 10)], &ProjectZ::new(5.0)).unwrap();
        let mesh = HalfEdgeMesh::from_triangles(
            vec![p(0.0, 3.0, 2.0), p(2.0, 0.0, 2.0), p(5.0, 5.0, 2.0)],
            &[[0, 1, 2]],
        );
        let mut tags = PropertyMap::new(3, None);
        tags[VertexId::new(0)] = Some(shape.element(3, ElementKind::Face1));
        tags[VertexId::new(1)] = Some(shape.element(0, ElementKind::Face1));
        let h = mesh.find_halfedge(VertexId::new(0), VertexId::new(1)).unwrap();
        assert_eq!(is_face_inside(&mesh, &tags, &shape, h), Some(true));
    }

    #[test]
    fn same_face_uses_orientation() {
        let shape = ShapeMesh::new(&[square(0, 0, 10)], &ProjectZ::new(5.0)).unwrap();
        let mesh = HalfEdgeMesh::from_triangles(
            vec![p(2.0, 0.0, 1.0), p(3.0, 0.0, 1.0), p(2.5, 4.0, 1.0)],
            &[[0, 1, 2]],
        );
        let mut tags = PropertyMap::new(3, None);
        tags[VertexId::new(0)] = Some(shape.element(0, ElementKind::Face1));
        tags[VertexId::new(1)] = Some(shape.element(0, ElementKind::Face1));
        let h = mesh.find_halfedge(VertexId::new(0), VertexId::new(1)).unwrap();
        assert_eq!(is_face_inside(&mesh, &tags, &shape, h), Some(true));
        tags[VertexId::new(1)] = None;
        assert_eq!(is_face_inside(&mesh, &tags, &shape, h), None);
    }

    // ── areas of interest ──

    #[test]
    fn square_cut_from_plane() {
        let shapes = [square(0, 0, 10)];
        let shape = ShapeMesh::new(&shapes, &ProjectZ::new(5.0)).unwrap();
        let cut = cut_from_model(plane(2.0), &shape, 0);
        assert_eq!(cut.aois.len(), 1);
        let aoi = &cut.aois[0];
        assert!((aoi_area(&cut, aoi) - 100.0).abs() < 1e-6);
        assert_eq!(aoi.outline.len(), 8);
    }

    #[test]
    fn two_squares_give_two_areas() {
        let shapes = [square(-8, -8, 4), square(2, 2, 5)];
        let shape = ShapeMesh::new(&shapes, &ProjectZ::new(5.0)).unwrap();
        let cut = cut_from_model(plane(2.0), &shape, 0);
        assert_eq!(cut.aois.len(), 2);
        let mut areas: Vec<f64> = cut.aois.iter().map(|a| aoi_area(&cut, a)).collect();
        areas.sort_by(f64::total_cmp);
        assert!((areas[0] - 16.0).abs() < 1e-6);
        assert!((areas[1] - 25.0).abs() < 1e-6);
    }

    #[test]
    fn shape_with_hole_keeps_hole_out() {
        let shapes = [ExPolygon::new(
            Polygon::new(vec![pt(-6, -6), pt(6, -6), pt(6, 6), pt(-6, 6)]),
            vec![Polygon::new(vec![pt(-2, -2), pt(-2, 2), pt(2, 2), pt(2, -2)])],
        )];
        let shape = ShapeMesh::new(&shapes, &ProjectZ::new(5.0)).unwrap();
        let cut = cut_from_model(plane(2.0), &shape, 0);
        assert_eq!(cut.aois.len(), 1);
        assert!((aoi_area(&cut, &cut.aois[0]) - 128.0).abs() < 1e-6);
    }

    #[test]
    fn anomaly_leaves_model_without_areas() {
        let shape = ShapeMesh::new(&[square(0, 0, 10)], &ProjectZ::new(5.0)).unwrap();
        let cut = cut_from_model(plane(0.0), &shape, 0);
        assert!(cut.aois.is_empty());
        assert_eq!(cut.mesh.n_faces(), 2);
    }
}
