//! Joining of the selected patches into one surface cut.

use crate::math::Point3;
use crate::topology::TriangleMesh;

use super::patch::SurfacePatch;

/// Indexed triangle surface with its closed outlines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceCut {
    pub vertices: Vec<Point3>,
    pub indices: Vec<[u32; 3]>,
    /// Closed loops of vertex indices along the open border.
    pub contours: Vec<Vec<u32>>,
}

impl SurfaceCut {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Adds `other`, shifting its indices behind the present vertices.
    #[allow(clippy::cast_possible_truncation)]
    pub fn append(&mut self, other: Self) {
        if self.vertices.is_empty() {
            *self = other;
            return;
        }
        let offset = self.vertices.len() as u32;
        self.vertices.extend(other.vertices);
        self.indices
            .extend(other.indices.into_iter().map(|t| t.map(|i| i + offset)));
        self.contours.extend(
            other
                .contours
                .into_iter()
                .map(|c| c.into_iter().map(|i| i + offset).collect()),
        );
    }

    /// Triangles of the cut without the contours.
    #[must_use]
    pub fn to_triangle_mesh(&self) -> TriangleMesh {
        TriangleMesh::new(self.vertices.clone(), self.indices.clone())
    }
}

/// Converts one patch; vertex order is kept.
#[must_use]
pub fn patch_to_cut(patch: &SurfacePatch) -> SurfaceCut {
    let mesh = &patch.mesh;
    SurfaceCut {
        vertices: mesh.points().to_vec(),
        indices: mesh
            .faces()
            .map(|f| mesh.face_vertices(f).map(|v| v.idx()))
            .collect(),
        contours: patch
            .loops
            .iter()
            .map(|lp| lp.iter().map(|v| v.idx()).collect())
            .collect(),
    }
}

/// Concatenates the patches marked in `mask`.
#[must_use]
pub fn merge_patches(patches: &[SurfacePatch], mask: &[bool]) -> SurfaceCut {
    let mut result = SurfaceCut::default();
    for (patch, _) in patches.iter().zip(mask).filter(|(_, &used)| used) {
        result.append(patch_to_cut(patch));
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::cut::patch::collect_open_edges;
    use crate::topology::{HalfEdgeMesh, PropertyMap};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn triangle_patch(x: f64) -> SurfacePatch {
        let mesh = HalfEdgeMesh::from_triangles(
            vec![p(x, 0.0, 1.0), p(x + 1.0, 0.0, 1.0), p(x, 1.0, 1.0)],
            &[[0, 1, 2]],
        );
        let mut patches = vec![SurfacePatch::new(mesh, PropertyMap::from_vec(vec![None; 3]))];
        collect_open_edges(&mut patches);
        patches.remove(0)
    }

    #[test]
    fn patch_converts_with_its_loop() {
        let cut = patch_to_cut(&triangle_patch(0.0));
        assert_eq!(cut.vertices.len(), 3);
        assert_eq!(cut.indices, vec![[0, 1, 2]]);
        assert_eq!(cut.contours.len(), 1);
        assert_eq!(cut.contours[0].len(), 3);
    }

    #[test]
    fn masked_patches_are_skipped() {
        let patches = [triangle_patch(0.0), triangle_patch(5.0), triangle_patch(10.0)];
        let cut = merge_patches(&patches, &[true, false, true]);
        assert_eq!(cut.vertices.len(), 6);
        assert_eq!(cut.indices, vec![[0, 1, 2], [3, 4, 5]]);
        assert!(cut.contours[1].iter().all(|&i| i >= 3));
        assert!((cut.vertices[3].x - 10.0).abs() < 1e-12);
    }

    #[test]
    fn nothing_selected_is_empty() {
        let patches = [triangle_patch(0.0)];
        assert!(merge_patches(&patches, &[false]).is_empty());
        assert!(merge_patches(&[], &[]).is_empty());
    }
}
