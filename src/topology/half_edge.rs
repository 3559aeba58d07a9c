//! Triangle-only half-edge mesh stored as plain arrays.
//!
//! Half-edge `3f + i` runs from corner `i` to corner `i + 1` of face `f`, so
//! `next`, `prev`, `face` and `source` are index arithmetic. Only the
//! opposite links and edge ids are stored. Edges used by more than two
//! half-edges, or by two half-edges of the same direction, stay open.

use std::collections::HashMap;

use super::property::Handle;
use super::TriangleMesh;
use crate::math::intersect_3d::triangle_normal;
use crate::math::{Point3, Vector3};

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[must_use]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            #[must_use]
            pub const fn idx(self) -> u32 {
                self.0
            }
        }

        impl Handle for $name {
            fn index(self) -> usize {
                self.0 as usize
            }

            #[allow(clippy::cast_possible_truncation)]
            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }
    };
}

define_handle!(
    /// Vertex of a [`HalfEdgeMesh`].
    VertexId
);
define_handle!(
    /// Directed half-edge of a [`HalfEdgeMesh`].
    HalfEdgeId
);
define_handle!(
    /// Undirected edge of a [`HalfEdgeMesh`].
    EdgeId
);
define_handle!(
    /// Triangle of a [`HalfEdgeMesh`].
    FaceId
);

#[derive(Debug, Clone, Default)]
pub struct HalfEdgeMesh {
    points: Vec<Point3>,
    faces: Vec<[VertexId; 3]>,
    opposite: Vec<Option<HalfEdgeId>>,
    edge_of: Vec<EdgeId>,
    edge_halfedge: Vec<HalfEdgeId>,
    vertex_faces: Vec<Vec<FaceId>>,
}

impl HalfEdgeMesh {
    /// Builds the mesh from positions and index triples.
    ///
    /// Triangles repeating a vertex are dropped.
    #[must_use]
    pub fn from_triangles(points: Vec<Point3>, triangles: &[[u32; 3]]) -> Self {
        let faces: Vec<[VertexId; 3]> = triangles
            .iter()
            .filter(|t| t[0] != t[1] && t[1] != t[2] && t[2] != t[0])
            .map(|t| t.map(VertexId::new))
            .collect();

        let n_half = faces.len() * 3;
        let mut directed: HashMap<(VertexId, VertexId), Option<HalfEdgeId>> =
            HashMap::with_capacity(n_half);
        for (f, tri) in faces.iter().enumerate() {
            for i in 0..3 {
                let key = (tri[i], tri[(i + 1) % 3]);
                let h = HalfEdgeId::from_index(3 * f + i);
                directed
                    .entry(key)
                    .and_modify(|slot| *slot = None)
                    .or_insert(Some(h));
            }
        }

        let mut opposite = vec![None; n_half];
        for (f, tri) in faces.iter().enumerate() {
            for i in 0..3 {
                let (s, t) = (tri[i], tri[(i + 1) % 3]);
                let Some(Some(_)) = directed.get(&(s, t)) else {
                    continue;
                };
                if let Some(Some(op)) = directed.get(&(t, s)) {
                    opposite[3 * f + i] = Some(*op);
                }
            }
        }

        let mut edge_of = vec![EdgeId::new(u32::MAX); n_half];
        let mut edge_halfedge = Vec::with_capacity(n_half / 2 + 1);
        for h in 0..n_half {
            if edge_of[h].idx() != u32::MAX {
                continue;
            }
            let e = EdgeId::from_index(edge_halfedge.len());
            edge_halfedge.push(HalfEdgeId::from_index(h));
            edge_of[h] = e;
            if let Some(op) = opposite[h] {
                edge_of[op.index()] = e;
            }
        }

        let mut vertex_faces = vec![Vec::new(); points.len()];
        for (f, tri) in faces.iter().enumerate() {
            for v in tri {
                vertex_faces[v.index()].push(FaceId::from_index(f));
            }
        }

        Self {
            points,
            faces,
            opposite,
            edge_of,
            edge_halfedge,
            vertex_faces,
        }
    }

    /// Builds the mesh from the triangles of `mesh` not marked in `skip`,
    /// keeping only used vertices. `flip` reverses every triangle.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_mesh(mesh: &TriangleMesh, skip: &[bool], flip: bool) -> Self {
        let mut remap = vec![u32::MAX; mesh.vertices.len()];
        let mut points = Vec::new();
        let mut triangles = Vec::new();
        for (i, t) in mesh.indices.iter().enumerate() {
            if skip.get(i).copied().unwrap_or(false) {
                continue;
            }
            let mut tri = [0_u32; 3];
            for (k, &vi) in t.iter().enumerate() {
                let slot = &mut remap[vi as usize];
                if *slot == u32::MAX {
                    *slot = points.len() as u32;
                    points.push(mesh.vertices[vi as usize]);
                }
                tri[k] = *slot;
            }
            if flip {
                tri.swap(1, 2);
            }
            triangles.push(tri);
        }
        Self::from_triangles(points, &triangles)
    }

    /// Indexed triangle set with the same vertices and faces.
    #[must_use]
    pub fn to_triangle_mesh(&self) -> TriangleMesh {
        TriangleMesh::new(
            self.points.clone(),
            self.faces.iter().map(|f| f.map(VertexId::idx)).collect(),
        )
    }

    // --- sizes and iteration ---

    #[must_use]
    pub fn n_vertices(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn n_halfedges(&self) -> usize {
        self.faces.len() * 3
    }

    #[must_use]
    pub fn n_edges(&self) -> usize {
        self.edge_halfedge.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> {
        (0..self.n_vertices()).map(VertexId::from_index)
    }

    pub fn faces(&self) -> impl Iterator<Item = FaceId> {
        (0..self.n_faces()).map(FaceId::from_index)
    }

    pub fn halfedges(&self) -> impl Iterator<Item = HalfEdgeId> {
        (0..self.n_halfedges()).map(HalfEdgeId::from_index)
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.n_edges()).map(EdgeId::from_index)
    }

    // --- geometry ---

    #[must_use]
    pub fn point(&self, v: VertexId) -> &Point3 {
        &self.points[v.index()]
    }

    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    #[must_use]
    pub fn face_points(&self, f: FaceId) -> [Point3; 3] {
        self.faces[f.index()].map(|v| self.points[v.index()])
    }

    #[must_use]
    pub fn face_normal(&self, f: FaceId) -> Option<Vector3> {
        let [a, b, c] = self.face_points(f);
        triangle_normal(&a, &b, &c)
    }

    // --- connectivity ---

    #[must_use]
    pub fn face_vertices(&self, f: FaceId) -> [VertexId; 3] {
        self.faces[f.index()]
    }

    #[must_use]
    pub fn face_halfedges(&self, f: FaceId) -> [HalfEdgeId; 3] {
        let h = f.idx() * 3;
        [HalfEdgeId::new(h), HalfEdgeId::new(h + 1), HalfEdgeId::new(h + 2)]
    }

    /// Representative half-edge of an edge; always has a face.
    #[must_use]
    pub fn edge_halfedge(&self, e: EdgeId) -> HalfEdgeId {
        self.edge_halfedge[e.index()]
    }

    #[must_use]
    pub fn next(&self, h: HalfEdgeId) -> HalfEdgeId {
        let i = h.idx();
        HalfEdgeId::new(if i % 3 == 2 { i - 2 } else { i + 1 })
    }

    #[must_use]
    pub fn prev(&self, h: HalfEdgeId) -> HalfEdgeId {
        let i = h.idx();
        HalfEdgeId::new(if i % 3 == 0 { i + 2 } else { i - 1 })
    }

    /// Opposite half-edge; `None` on an open boundary.
    #[must_use]
    pub fn opposite(&self, h: HalfEdgeId) -> Option<HalfEdgeId> {
        self.opposite[h.index()]
    }

    #[must_use]
    pub fn face(&self, h: HalfEdgeId) -> FaceId {
        FaceId::new(h.idx() / 3)
    }

    #[must_use]
    pub fn edge(&self, h: HalfEdgeId) -> EdgeId {
        self.edge_of[h.index()]
    }

    #[must_use]
    pub fn source(&self, h: HalfEdgeId) -> VertexId {
        let i = h.index();
        self.faces[i / 3][i % 3]
    }

    #[must_use]
    pub fn target(&self, h: HalfEdgeId) -> VertexId {
        let i = h.index();
        self.faces[i / 3][(i % 3 + 1) % 3]
    }

    /// Faces using vertex `v`, in face order.
    #[must_use]
    pub fn faces_around_vertex(&self, v: VertexId) -> &[FaceId] {
        &self.vertex_faces[v.index()]
    }

    /// Face on the other side of half-edge `h`.
    #[must_use]
    pub fn opposite_face(&self, h: HalfEdgeId) -> Option<FaceId> {
        self.opposite(h).map(|op| self.face(op))
    }

    /// Half-edge from `from` to `to`, if a face contains it.
    #[must_use]
    pub fn find_halfedge(&self, from: VertexId, to: VertexId) -> Option<HalfEdgeId> {
        self.faces_around_vertex(from).iter().find_map(|&f| {
            self.face_halfedges(f)
                .into_iter()
                .find(|&h| self.source(h) == from && self.target(h) == to)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    /// Unit square split along its diagonal.
    fn square() -> HalfEdgeMesh {
        HalfEdgeMesh::from_triangles(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)],
            &[[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn counts() {
        let m = square();
        assert_eq!(m.n_faces(), 2);
        assert_eq!(m.n_halfedges(), 6);
        assert_eq!(m.n_edges(), 5);
    }

    #[test]
    fn next_prev_cycle() {
        let m = square();
        for h in m.halfedges() {
            assert_eq!(m.next(m.next(m.next(h))), h);
            assert_eq!(m.prev(m.next(h)), h);
            assert_eq!(m.source(m.next(h)), m.target(h));
        }
    }

    #[test]
    fn diagonal_is_shared() {
        let m = square();
        let h = m.find_halfedge(VertexId::new(2), VertexId::new(0)).unwrap();
        let op = m.opposite(h).unwrap();
        assert_eq!(m.source(op), VertexId::new(0));
        assert_eq!(m.target(op), VertexId::new(2));
        assert_eq!(m.edge(h), m.edge(op));
        assert_ne!(m.face(h), m.face(op));
    }

    #[test]
    fn boundary_has_no_opposite() {
        let m = square();
        let h = m.find_halfedge(VertexId::new(0), VertexId::new(1)).unwrap();
        assert!(m.opposite(h).is_none());
    }

    #[test]
    fn inconsistent_orientation_stays_open() {
        // Second triangle repeats the directed edge 0->2.
        let m = HalfEdgeMesh::from_triangles(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)],
            &[[0, 1, 2], [0, 2, 3], [3, 2, 0]],
        );
        let h = m.find_halfedge(VertexId::new(2), VertexId::new(0)).unwrap();
        assert!(m.opposite(h).is_none());
    }

    #[test]
    fn from_mesh_skips_and_compacts() {
        let mesh = TriangleMesh::new(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)],
            vec![[0, 1, 2], [0, 2, 3]],
        );
        let m = HalfEdgeMesh::from_mesh(&mesh, &[true, false], true);
        assert_eq!(m.n_faces(), 1);
        assert_eq!(m.n_vertices(), 3);
        let n = m.face_normal(FaceId::new(0)).unwrap();
        assert!(n.z < 0.0);
    }

    #[test]
    fn degenerate_triangle_dropped() {
        let m = HalfEdgeMesh::from_triangles(
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0)],
            &[[0, 1, 1], [0, 1, 2]],
        );
        assert_eq!(m.n_faces(), 1);
    }
}
