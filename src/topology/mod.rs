pub mod half_edge;
pub mod property;

pub use half_edge::{EdgeId, FaceId, HalfEdgeId, HalfEdgeMesh, VertexId};
pub use property::{Handle, PropertyMap};

use crate::error::{Result, TopologyError};
use crate::math::aabb::Aabb3;
use crate::math::intersect_3d::triangle_normal;
use crate::math::{Point3, Vector3};

/// Indexed triangle set: shared vertex positions plus index triples.
///
/// Triangles are counter-clockwise seen from the side their normal points to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3>,
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    #[must_use]
    pub fn new(vertices: Vec<Point3>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Checks that every index refers to an existing vertex.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::IndexOutOfRange`] for the first bad index.
    pub fn validate(&self) -> Result<()> {
        let count = self.vertices.len();
        for t in &self.indices {
            for &i in t {
                if i as usize >= count {
                    return Err(TopologyError::IndexOutOfRange {
                        entity: "vertex",
                        index: i as usize,
                        count,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Corner positions of triangle `i`.
    #[must_use]
    pub fn triangle(&self, i: usize) -> [Point3; 3] {
        let t = self.indices[i];
        [
            self.vertices[t[0] as usize],
            self.vertices[t[1] as usize],
            self.vertices[t[2] as usize],
        ]
    }

    /// Unit normal of triangle `i`, `None` for degenerate triangles.
    #[must_use]
    pub fn face_normal(&self, i: usize) -> Option<Vector3> {
        let [a, b, c] = self.triangle(i);
        triangle_normal(&a, &b, &c)
    }

    #[must_use]
    pub fn bounding_box(&self) -> Aabb3 {
        Aabb3::from_points(&self.vertices)
    }

    /// Reverses the winding of every triangle.
    pub fn flip(&mut self) {
        for t in &mut self.indices {
            t.swap(1, 2);
        }
    }

    /// Appends another mesh, offsetting its indices.
    #[allow(clippy::cast_possible_truncation)]
    pub fn append(&mut self, other: &Self) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices
            .extend(other.indices.iter().map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]));
    }

    /// Number of edges used by exactly one triangle (orientation ignored).
    #[must_use]
    pub fn count_open_edges(&self) -> usize {
        let mut counts: std::collections::HashMap<(u32, u32), usize> =
            std::collections::HashMap::new();
        for t in &self.indices {
            for i in 0..3 {
                let (a, b) = (t[i], t[(i + 1) % 3]);
                *counts.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        counts.values().filter(|&&c| c == 1).count()
    }
}
