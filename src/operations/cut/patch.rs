//! Surface patches: standalone meshes cut out of a model.

use tracing::debug;

use super::reduce::{reduced, ReductionMap};
use crate::math::aabb::Aabb3;
use crate::math::Point3;
use crate::topology::{FaceId, HalfEdgeId, HalfEdgeMesh, Handle, PropertyMap, VertexId};

/// Closed outline of a patch as vertex ids.
pub type Loop = Vec<VertexId>;

/// Part of a model surface lying under one shape.
#[derive(Debug, Clone)]
pub struct SurfacePatch {
    pub mesh: HalfEdgeMesh,
    /// Vertex of the cut model each patch vertex comes from; `None` for
    /// vertices created by clipping.
    pub source: PropertyMap<VertexId, Option<VertexId>>,
    pub loops: Vec<Loop>,
    pub bb: Aabb3,
    pub model_id: usize,
    pub aoi_id: usize,
    /// Flat shape point index until selection, expolygon index after.
    pub shape_id: u32,
    /// The patch still covers its whole area of interest.
    pub is_whole_aoi: bool,
}

impl SurfacePatch {
    /// Patch with the given mesh and source map; ids are left at zero.
    #[must_use]
    pub fn new(mesh: HalfEdgeMesh, source: PropertyMap<VertexId, Option<VertexId>>) -> Self {
        let bb = Aabb3::from_points(mesh.points());
        Self {
            mesh,
            source,
            loops: Vec::new(),
            bb,
            model_id: 0,
            aoi_id: 0,
            shape_id: 0,
            is_whole_aoi: false,
        }
    }

    /// Copies the ids of `other`.
    #[must_use]
    pub fn with_ids_of(mut self, other: &Self) -> Self {
        self.model_id = other.model_id;
        self.aoi_id = other.aoi_id;
        self.shape_id = other.shape_id;
        self
    }
}

/// Copies `faces` of `mesh` into a new patch, collapsing vertices through
/// `reduction`. Triangles made degenerate by the collapse are skipped.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn create_surface_patch(
    faces: &[FaceId],
    mesh: &HalfEdgeMesh,
    reduction: Option<&ReductionMap>,
) -> SurfacePatch {
    let mut to_patch = vec![u32::MAX; mesh.n_vertices()];
    let mut points: Vec<Point3> = Vec::new();
    let mut source: Vec<Option<VertexId>> = Vec::new();
    let mut triangles: Vec<[u32; 3]> = Vec::with_capacity(faces.len());
    for &f in faces {
        let t = mesh
            .face_vertices(f)
            .map(|v| reduction.map_or(v, |map| reduced(map, v)));
        if t[0] == t[1] || t[1] == t[2] || t[2] == t[0] {
            continue;
        }
        triangles.push(t.map(|v| {
            let slot = &mut to_patch[v.index()];
            if *slot == u32::MAX {
                *slot = points.len() as u32;
                points.push(*mesh.point(v));
                source.push(Some(v));
            }
            *slot
        }));
    }
    SurfacePatch::new(
        HalfEdgeMesh::from_triangles(points, &triangles),
        PropertyMap::from_vec(source),
    )
}

/// Copies `faces` of `patch` into a new patch whose source map points to
/// the model of `patch`.
#[must_use]
pub fn separate_patch(faces: &[FaceId], patch: &SurfacePatch) -> SurfacePatch {
    let mut part = create_surface_patch(faces, &patch.mesh, None).with_ids_of(patch);
    let chained: Vec<Option<VertexId>> = part
        .source
        .iter()
        .map(|(_, s)| s.and_then(|v| patch.source[v]))
        .collect();
    part.source = PropertyMap::from_vec(chained);
    part
}

/// Face sets of the edge-connected components of `mesh`.
#[must_use]
pub fn connected_components(
    mesh: &HalfEdgeMesh,
    is_border: impl Fn(HalfEdgeId) -> bool,
) -> Vec<Vec<FaceId>> {
    let mut processed = PropertyMap::new(mesh.n_faces(), false);
    let mut components = Vec::new();
    let mut stack = Vec::new();
    for start in mesh.faces() {
        if processed[start] {
            continue;
        }
        let mut faces = Vec::new();
        stack.push(start);
        while let Some(f) = stack.pop() {
            if processed[f] {
                continue;
            }
            processed[f] = true;
            faces.push(f);
            for h in mesh.face_halfedges(f) {
                if is_border(h) {
                    continue;
                }
                if let Some(n) = mesh.opposite_face(h) {
                    if !processed[n] {
                        stack.push(n);
                    }
                }
            }
        }
        components.push(faces);
    }
    components
}

/// Splits a clipped patch into its connected parts. Every part loses the
/// whole-area flag.
#[must_use]
pub fn divide_patch(mut patch: SurfacePatch) -> Vec<SurfacePatch> {
    let components = connected_components(&patch.mesh, |_| false);
    if components.len() <= 1 {
        patch.bb = Aabb3::from_points(patch.mesh.points());
        patch.is_whole_aoi = false;
        return vec![patch];
    }
    components
        .iter()
        .map(|faces| separate_patch(faces, &patch))
        .collect()
}

/// Chains outline half-edges into closed loops. Chains that do not close
/// are dropped.
#[must_use]
pub fn create_loops(outlines: &[HalfEdgeId], mesh: &HalfEdgeMesh) -> Vec<Loop> {
    let mut loops: Vec<Loop> = Vec::new();
    let mut unclosed: Vec<Loop> = Vec::new();
    for &h in outlines {
        let (s, t) = (mesh.source(h), mesh.target(h));
        let open_end = unclosed.iter().position(|c| c.last() == Some(&s));
        match open_end {
            Some(i) if unclosed[i].first() == Some(&t) => {
                loops.push(unclosed.swap_remove(i));
            }
            Some(i) => {
                let tail = unclosed
                    .iter()
                    .enumerate()
                    .find(|(j, c)| *j != i && c.first() == Some(&t))
                    .map(|(j, _)| j);
                if let Some(j) = tail {
                    let tail = unclosed.swap_remove(j);
                    // swap_remove may have moved the chain being extended.
                    let i = if i == unclosed.len() { j } else { i };
                    unclosed[i].extend(tail);
                } else {
                    unclosed[i].push(t);
                }
            }
            None => {
                if let Some(c) = unclosed.iter_mut().find(|c| c.first() == Some(&t)) {
                    c.insert(0, s);
                } else {
                    unclosed.push(vec![s, t]);
                }
            }
        }
    }
    if !unclosed.is_empty() {
        debug!(count = unclosed.len(), "outline chains left open");
    }
    loops
}

/// Rebuilds the loops of every patch from its open half-edges.
pub fn collect_open_edges(patches: &mut [SurfacePatch]) {
    for patch in patches {
        let mesh = &patch.mesh;
        let open: Vec<HalfEdgeId> = mesh
            .faces()
            .flat_map(|f| mesh.face_halfedges(f))
            .filter(|&h| mesh.opposite(h).is_none())
            .collect();
        patch.loops = create_loops(&open, mesh);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point3 {
        Point3::new(x, y, 0.0)
    }

    /// Two unit squares side by side sharing the edge 1-4.
    fn strip() -> HalfEdgeMesh {
        HalfEdgeMesh::from_triangles(
            vec![p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0), p(0.0, 1.0), p(1.0, 1.0), p(2.0, 1.0)],
            &[[0, 1, 4], [0, 4, 3], [1, 2, 5], [1, 5, 4]],
        )
    }

    fn all_faces(mesh: &HalfEdgeMesh) -> Vec<FaceId> {
        mesh.faces().collect()
    }

    // ── creation ──

    #[test]
    fn patch_keeps_source_vertices() {
        let mesh = strip();
        let patch = create_surface_patch(&[FaceId::new(2), FaceId::new(3)], &mesh, None);
        assert_eq!(patch.mesh.n_faces(), 2);
        assert_eq!(patch.mesh.n_vertices(), 4);
        let sources: Vec<u32> = patch.source.iter().map(|(_, s)| s.unwrap().idx()).collect();
        assert_eq!(sources, vec![1, 2, 5, 4]);
        assert!((patch.bb.min.x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reduction_skips_collapsed_triangles() {
        let mesh = strip();
        let mut map: ReductionMap = PropertyMap::new(6, None);
        map[VertexId::new(1)] = Some(VertexId::new(0));
        let patch = create_surface_patch(&all_faces(&mesh), &mesh, Some(&map));
        // Triangle 0-1-4 collapses.
        assert_eq!(patch.mesh.n_faces(), 3);
        assert_eq!(patch.mesh.n_vertices(), 5);
    }

    // ── division ──

    #[test]
    fn connected_patch_is_not_divided() {
        let mesh = strip();
        let mut patch = create_surface_patch(&all_faces(&mesh), &mesh, None);
        patch.is_whole_aoi = true;
        let parts = divide_patch(patch);
        assert_eq!(parts.len(), 1);
        assert!(!parts[0].is_whole_aoi);
    }

    #[test]
    fn separated_islands_become_patches() {
        let mesh = HalfEdgeMesh::from_triangles(
            vec![p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0), p(5.0, 0.0), p(6.0, 0.0), p(5.0, 1.0)],
            &[[0, 1, 2], [3, 4, 5]],
        );
        let mut patch = create_surface_patch(&all_faces(&mesh), &mesh, None);
        patch.model_id = 3;
        patch.source[VertexId::new(4)] = Some(VertexId::new(40));
        let parts = divide_patch(patch);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.model_id == 3 && !p.is_whole_aoi));
        assert_eq!(parts[1].source[VertexId::new(1)], Some(VertexId::new(40)));
    }

    // ── loops ──

    #[test]
    fn open_edges_form_one_loop() {
        let mesh = strip();
        let mut patches = vec![create_surface_patch(&all_faces(&mesh), &mesh, None)];
        collect_open_edges(&mut patches);
        assert_eq!(patches[0].loops.len(), 1);
        assert_eq!(patches[0].loops[0].len(), 6);
    }

    #[test]
    fn chains_are_joined_in_any_order() {
        let mesh = strip();
        let h = |a: u32, b: u32| mesh.find_halfedge(VertexId::new(a), VertexId::new(b)).unwrap();
        // Boundary 0-1-2-5-4-3 given out of order.
        let outline = [h(0, 1), h(2, 5), h(4, 3), h(1, 2), h(5, 4), h(3, 0)];
        let loops = create_loops(&outline, &mesh);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 6);
    }

    #[test]
    fn open_chain_is_dropped() {
        let mesh = strip();
        let h = |a: u32, b: u32| mesh.find_halfedge(VertexId::new(a), VertexId::new(b)).unwrap();
        assert!(create_loops(&[h(0, 1), h(1, 2)], &mesh).is_empty());
    }
}
