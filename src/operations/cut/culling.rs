//! Removes triangles that can not take part in a cut.

use rayon::prelude::*;

use crate::geometry::BoundingBox;
use crate::math::{Point3, Vector3};
use crate::operations::projection::{Project, Project3d};
use crate::topology::TriangleMesh;

/// Signed distance above which a vertex is out of a bounding plane.
pub const OUT_OF_AOI_EPSILON: f64 = 1e-5;

#[derive(Debug, Clone, Copy)]
struct PointNormal {
    point: Point3,
    normal: Vector3,
}

impl PointNormal {
    fn is_out(&self, v: &Point3, epsilon: f64) -> bool {
        (v - self.point).dot(&self.normal) > epsilon
    }
}

/// Four planes through the extruded corners of `bb`: under, left, above,
/// right. Normals point out of the extruded box.
fn bounding_planes<P: Project + ?Sized>(projection: &P, bb: &BoundingBox) -> [PointNormal; 4] {
    let corners = bb.corners().map(|c| projection.create_front_back(&c));
    let mut planes = [PointNormal {
        point: Point3::origin(),
        normal: Vector3::zeros(),
    }; 4];
    let mut prev = 3;
    for (i, plane) in planes.iter_mut().enumerate() {
        let (p1, p2) = corners[i];
        let p3 = corners[prev].0;
        prev = i;
        let v1 = (p2 - p1).normalize();
        let v2 = (p3 - p1).normalize();
        *plane = PointNormal {
            point: p1,
            normal: v2.cross(&v1).normalize(),
        };
    }
    // Mirrored projections flip every normal.
    if planes[0].is_out(&planes[2].point, OUT_OF_AOI_EPSILON) {
        for plane in &mut planes {
            plane.normal = -plane.normal;
        }
    }
    planes
}

/// Marks triangles lying completely out of the extruded bounding box.
///
/// A triangle is out when all of its vertices are beyond the same plane.
pub fn set_skip_for_out_of_aoi<P: Project + ?Sized>(
    skip: &mut [bool],
    mesh: &TriangleMesh,
    projection: &P,
    bb: &BoundingBox,
) {
    set_skip_for_out_of_aoi_with(skip, mesh, projection, bb, OUT_OF_AOI_EPSILON);
}

/// [`set_skip_for_out_of_aoi`] with an explicit plane tolerance.
pub fn set_skip_for_out_of_aoi_with<P: Project + ?Sized>(
    skip: &mut [bool],
    mesh: &TriangleMesh,
    projection: &P,
    bb: &BoundingBox,
    epsilon: f64,
) {
    debug_assert_eq!(skip.len(), mesh.indices.len());
    let planes = bounding_planes(projection, bb);

    let sides: Vec<[bool; 4]> = mesh
        .vertices
        .par_iter()
        .map(|v| {
            let mut side = [false; 4];
            // Under excludes above and left excludes right.
            for pair in [[0, 2], [1, 3]] {
                if let Some(&s) = pair.iter().find(|&&s| planes[s].is_out(v, epsilon)) {
                    side[s] = true;
                }
            }
            side
        })
        .collect();

    skip.par_iter_mut()
        .zip(mesh.indices.par_iter())
        .for_each(|(skip, t)| {
            let all_out = (0..4).any(|s| t.iter().all(|&vi| sides[vi as usize][s]));
            if all_out {
                *skip = true;
            }
        });
}

/// Marks triangles whose normal is closer than `max_angle_deg` to being
/// perpendicular to the projection direction, or faces away from it.
pub fn set_skip_by_angle<P: Project3d + ?Sized>(
    skip: &mut [bool],
    mesh: &TriangleMesh,
    projection: &P,
    max_angle_deg: f64,
) {
    debug_assert_eq!(skip.len(), mesh.indices.len());
    let threshold = max_angle_deg.to_radians().cos();
    skip.par_iter_mut().enumerate().for_each(|(i, skip)| {
        if *skip {
            return;
        }
        let Some(normal) = mesh.face_normal(i) else {
            *skip = true;
            return;
        };
        let v = mesh.vertices[mesh.indices[i][0] as usize];
        let dir = projection.project(&v) - v;
        let Some(dir) = dir.try_normalize(0.0) else {
            *skip = true;
            return;
        };
        if dir.dot(&normal) <= threshold {
            *skip = true;
        }
    });
}

/// Triangles of `mesh` with a set `keep` flag, with unused vertices dropped.
///
/// A mask of the wrong length or one keeping nothing gives an empty mesh.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn mask_triangles(mesh: &TriangleMesh, keep: &[bool]) -> TriangleMesh {
    if keep.len() != mesh.indices.len() {
        return TriangleMesh::default();
    }
    let mut remap = vec![u32::MAX; mesh.vertices.len()];
    let mut result = TriangleMesh::default();
    for (t, _) in mesh.indices.iter().zip(keep).filter(|(_, &k)| k) {
        let tri = t.map(|vi| {
            let slot = &mut remap[vi as usize];
            if *slot == u32::MAX {
                *slot = result.vertices.len() as u32;
                result.vertices.push(mesh.vertices[vi as usize]);
            }
            *slot
        });
        result.indices.push(tri);
    }
    result
}

/// Part of `mesh` that may lie under the projected bounding box `bb`.
#[must_use]
pub fn cut_area_of_interest<P: Project + ?Sized>(
    mesh: &TriangleMesh,
    bb: &BoundingBox,
    projection: &P,
) -> TriangleMesh {
    let mut skip = vec![false; mesh.indices.len()];
    set_skip_for_out_of_aoi(&mut skip, mesh, projection, bb);
    let keep: Vec<bool> = skip.iter().map(|s| !s).collect();
    mask_triangles(mesh, &keep)
}
