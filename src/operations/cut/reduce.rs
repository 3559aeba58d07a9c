//! Removal of diagonal vertices from the cut outline.
//!
//! Vertices created where a chord crosses a wall diagonal only split the
//! outline; collapsing each onto its chord neighbour keeps the outline on
//! shape corners and wall crossings.

use super::shape_mesh::{ElementKind, IntersectingElement};
use crate::math::Vector3;
use crate::topology::{EdgeId, HalfEdgeId, HalfEdgeMesh, PropertyMap, VertexId};

/// Target vertex for every collapsed vertex.
pub type ReductionMap = PropertyMap<VertexId, Option<VertexId>>;

fn is_reducible(tags: &PropertyMap<VertexId, Option<IntersectingElement>>, v: VertexId) -> bool {
    tags[v].is_some_and(|t| t.kind == ElementKind::Edge2)
}

fn same_signs(a: &Vector3, b: &Vector3) -> bool {
    (a.x > 0.0) == (b.x > 0.0) && (a.y > 0.0) == (b.y > 0.0) && (a.z > 0.0) == (b.z > 0.0)
}

/// Collapses the target of `h` onto its source unless that flips a
/// triangle around the target.
fn add_reduction(mesh: &HalfEdgeMesh, map: &mut ReductionMap, h: HalfEdgeId) {
    let erase = mesh.target(h);
    let left = mesh.source(h);
    if map[erase].is_some() {
        return;
    }
    let (pe, pl) = (mesh.point(erase), mesh.point(left));
    for &f in mesh.faces_around_vertex(erase) {
        let vertices = mesh.face_vertices(f);
        if vertices.contains(&left) {
            continue;
        }
        let mut rest = vertices.into_iter().filter(|&v| v != erase);
        let (Some(a), Some(b)) = (rest.next(), rest.next()) else {
            continue;
        };
        let (pa, pb) = (mesh.point(a), mesh.point(b));
        let ab = pb - pa;
        if !same_signs(&ab.cross(&(pe - pa)), &ab.cross(&(pl - pa))) {
            return;
        }
    }
    map[erase] = Some(left);
}

/// Builds the reduction of every diagonal vertex on a constrained edge.
#[must_use]
pub fn create_reduce_map(
    mesh: &HalfEdgeMesh,
    tags: &PropertyMap<VertexId, Option<IntersectingElement>>,
    constrained: &PropertyMap<EdgeId, bool>,
) -> ReductionMap {
    let mut map = PropertyMap::new(mesh.n_vertices(), None);
    for (e, &is_constrained) in constrained.iter() {
        if !is_constrained {
            continue;
        }
        let h = mesh.edge_halfedge(e);
        if is_reducible(tags, mesh.target(h)) {
            add_reduction(mesh, &mut map, h);
        }
        if let Some(o) = mesh.opposite(h) {
            if is_reducible(tags, mesh.target(o)) {
                add_reduction(mesh, &mut map, o);
            }
        }
    }
    map
}

/// Final vertex of `v` after following the reduction chain.
#[must_use]
pub fn reduced(map: &ReductionMap, v: VertexId) -> VertexId {
    let mut current = v;
    for _ in 0..map.len() {
        match map[current] {
            Some(next) if next != v => current = next,
            _ => break,
        }
    }
    current
}
