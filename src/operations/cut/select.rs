//! Selection of the patches that form the final cut.

use tracing::debug;

use super::classify::ModelCut;
use super::distance::BestDistances;
use super::patch::SurfacePatch;
use super::shape_mesh::ElementKind;
use crate::geometry::clipper::{
    diff_ex, intersection_ex, offset_ex, union_ex, union_polygons, OffsetJoin,
};
use crate::geometry::{
    BoundingBox, ExPolygon, ExPolygons, ExPolygonsIndices, FillRule, Point, Polygon, Polygons,
};
use crate::operations::projection::Project;
use crate::topology::HalfEdgeId;

/// Depth interval `(min, max)` collected while unprojecting.
pub type DepthRange = (f64, f64);

/// Empty interval that any depth extends.
#[must_use]
pub fn empty_depth_range() -> DepthRange {
    (f64::MAX, f64::MIN)
}

/// Whether an untouched patch covers its whole expolygon: the outline of
/// its area of interest walks the shape segments in order and there is no
/// other open border.
#[must_use]
pub fn is_over_whole_expoly(patch: &SurfacePatch, cuts: &[ModelCut]) -> bool {
    if !patch.is_whole_aoi {
        return false;
    }
    let Some(cut) = cuts.get(patch.model_id) else {
        return false;
    };
    let Some(aoi) = cut.aois.get(patch.aoi_id) else {
        return false;
    };
    let mesh = &cut.mesh;
    for &h in &aoi.outline {
        let (Some(mut s), Some(mut t)) = (cut.tags[mesh.source(h)], cut.tags[mesh.target(h)]) else {
            return false;
        };
        if s.shape_point_index == t.shape_point_index {
            continue;
        }
        if s.shape_point_index > t.shape_point_index {
            std::mem::swap(&mut s, &mut t);
        }
        let is_last_segment = s.is_first && t.is_last;
        if is_last_segment {
            std::mem::swap(&mut s, &mut t);
        } else if s.is_last || s.shape_point_index + 1 != t.shape_point_index {
            return false;
        }
        // Next segment starts on its vertical edge; a front face can not
        // precede it.
        if t.kind != ElementKind::Edge1 || s.kind == ElementKind::Face1 {
            return false;
        }
    }

    let mut opens: Vec<HalfEdgeId> = aoi
        .outline
        .iter()
        .copied()
        .filter(|&h| mesh.opposite(h).is_none())
        .collect();
    opens.sort_unstable();
    aoi.faces
        .iter()
        .flat_map(|&f| mesh.face_halfedges(f))
        .filter(|&h| mesh.opposite(h).is_none())
        .all(|h| opens.binary_search(&h).is_ok())
}

/// Patch loops mapped back to shape space, extending `depth_range` by
/// every unprojected depth. Loops shorter than a triangle are skipped.
#[must_use]
pub fn unproject_loops<P: Project + ?Sized>(
    patch: &SurfacePatch,
    projection: &P,
    depth_range: &mut DepthRange,
) -> Polygons {
    let mut polygons = Polygons::with_capacity(patch.loops.len());
    for lp in &patch.loops {
        let mut points = Vec::with_capacity(lp.len());
        for &v in lp {
            let Some((p, depth)) = projection.unproject(patch.mesh.point(v)) else {
                continue;
            };
            depth_range.0 = depth_range.0.min(depth);
            depth_range.1 = depth_range.1.max(depth);
            points.push(Point::from_f64(p.x, p.y));
        }
        if points.len() >= 3 {
            polygons.push(Polygon::new(points));
        }
    }
    polygons
}

/// Area of a patch in shape space. Several resulting areas keep the one
/// with the most contour points.
#[must_use]
pub fn to_expoly<P: Project + ?Sized>(
    patch: &SurfacePatch,
    projection: &P,
    depth_range: &mut DepthRange,
) -> ExPolygon {
    let polygons = unproject_loops(patch, projection, depth_range);
    let mut areas = union_polygons(&polygons, FillRule::EvenOdd);
    if areas.len() > 1 {
        debug!(areas = areas.len(), "patch maps to several areas");
    }
    let mut biggest = 0;
    for (i, area) in areas.iter().enumerate().skip(1) {
        if area.contour.len() > areas[biggest].contour.len() {
            biggest = i;
        }
    }
    if areas.is_empty() {
        ExPolygon::default()
    } else {
        areas.swap_remove(biggest)
    }
}

struct PatchShape {
    patch_index: usize,
    intersection: ExPolygons,
    depth_center_distance: f64,
}

fn depth_center(range: DepthRange) -> f64 {
    (range.0 + range.1) / 2.0
}

/// Marks the patches used for the cut.
///
/// A patch is used when it supplies the chosen distance of at least one
/// shape point. When the used patches of an expolygon do not cover it,
/// unused patches of that expolygon are added greedily, nearest in depth
/// first, until the uncovered rest disappears.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn select_patches<P: Project + ?Sized>(
    best: &BestDistances,
    patches: &[SurfacePatch],
    shapes: &[ExPolygon],
    shapes_bb: &BoundingBox,
    s2i: &ExPolygonsIndices,
    cuts: &[ModelCut],
    projection: &P,
) -> Vec<bool> {
    // Covers the error of mapping patches back to shape space.
    let size = shapes_bb.size();
    let extend_delta = (f64::from(size.x) + f64::from(size.y)) / 200.0;

    let mut used_shapes_patches: Vec<Vec<usize>> = vec![Vec::new(); shapes.len()];
    let mut in_distances = vec![false; patches.len()];
    for (index, d) in best.iter().enumerate() {
        let Some(d) = d else { continue };
        if in_distances[d.patch_index] {
            continue;
        }
        in_distances[d.patch_index] = true;
        #[allow(clippy::cast_possible_truncation)]
        let shape_index = s2i.expolygon_of(index as u32) as usize;
        used_shapes_patches[shape_index].push(d.patch_index);
    }

    let mut shapes_patches: Vec<Vec<usize>> = vec![Vec::new(); shapes.len()];
    for (patch_index, patch) in patches.iter().enumerate() {
        if let Some(list) = shapes_patches.get_mut(patch.shape_id as usize) {
            list.push(patch_index);
        }
    }

    for (shape_index, shape) in shapes.iter().enumerate() {
        let used = &mut used_shapes_patches[shape_index];
        if used.is_empty() || used.len() == shapes_patches[shape_index].len() {
            continue;
        }
        if let [single] = used.as_slice() {
            if is_over_whole_expoly(&patches[*single], cuts) {
                continue;
            }
        }

        let mut used_depth = empty_depth_range();
        let mut fill = ExPolygons::with_capacity(used.len());
        for &patch_index in used.iter() {
            let area = to_expoly(&patches[patch_index], projection, &mut used_depth);
            if area.contour.is_empty() {
                continue;
            }
            fill.extend(offset_ex(&[area], extend_delta, OffsetJoin::default()));
        }
        let fill = union_ex(&fill);
        let mut rest = diff_ex(std::slice::from_ref(shape), &fill);
        if rest.is_empty() {
            continue;
        }

        let used_center = depth_center(used_depth);
        let mut candidates: Vec<PatchShape> = Vec::new();
        for &patch_index in &shapes_patches[shape_index] {
            if used.contains(&patch_index) {
                continue;
            }
            let mut depth = empty_depth_range();
            let area = to_expoly(&patches[patch_index], projection, &mut depth);
            if area.contour.is_empty() {
                continue;
            }
            let intersection = intersection_ex(&[area], &rest);
            if intersection.is_empty() {
                continue;
            }
            candidates.push(PatchShape {
                patch_index,
                intersection,
                depth_center_distance: (used_center - depth_center(depth)).abs(),
            });
        }

        match candidates.as_slice() {
            [] => continue,
            [only] => {
                used.push(only.patch_index);
                continue;
            }
            _ => {}
        }
        candidates.sort_by(|a, b| a.depth_center_distance.total_cmp(&b.depth_center_distance));
        for candidate in &candidates {
            if intersection_ex(&candidate.intersection, &rest).is_empty() {
                continue;
            }
            let cover = offset_ex(&candidate.intersection, extend_delta, OffsetJoin::default());
            rest = diff_ex(&rest, &cover);
            used.push(candidate.patch_index);
            if rest.is_empty() {
                break;
            }
        }
        debug!(shape_index, patches = used.len(), "shape filled from several patches");
    }

    let mut result = vec![false; patches.len()];
    for &patch_index in used_shapes_patches.iter().flatten() {
        result[patch_index] = true;
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::operations::cut::classify::cut_from_model;
    use crate::operations::cut::distance::ProjectionDistance;
    use crate::operations::cut::patch::{collect_open_edges, create_surface_patch};
    use crate::operations::cut::shape_mesh::ShapeMesh;
    use crate::operations::projection::ProjectZ;
    use crate::topology::{HalfEdgeMesh, PropertyMap, VertexId};

    fn pt(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> ExPolygon {
        let pts = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)].map(|(x, y)| pt(x, y));
        ExPolygon::new(Polygon::new(pts.to_vec()), vec![])
    }

    fn plane(z: f64) -> HalfEdgeMesh {
        HalfEdgeMesh::from_triangles(
            vec![p(-10.0, -10.0, z), p(10.0, -10.0, z), p(10.0, 10.0, z), p(-10.0, 10.0, z)],
            &[[0, 1, 3], [1, 2, 3]],
        )
    }

    /// Flat patch over `[x0, x1] x [y0, y1]` at depth `z`.
    fn flat_patch(x0: f64, y0: f64, x1: f64, y1: f64, z: f64, shape_id: u32) -> SurfacePatch {
        let mesh = HalfEdgeMesh::from_triangles(
            vec![p(x0, y0, z), p(x1, y0, z), p(x1, y1, z), p(x0, y1, z)],
            &[[0, 1, 2], [0, 2, 3]],
        );
        let mut patches = vec![SurfacePatch::new(mesh, PropertyMap::from_vec(vec![None; 4]))];
        collect_open_edges(&mut patches);
        let mut patch = patches.remove(0);
        patch.shape_id = shape_id;
        patch
    }

    fn chosen(patch_index: usize) -> Option<ProjectionDistance> {
        Some(ProjectionDistance {
            model_index: 0,
            aoi_index: 0,
            patch_index,
            distance: 0.0,
        })
    }

    // ── whole expolygon ──

    #[test]
    fn untouched_square_covers_its_expolygon() {
        let shapes = vec![rect(1, 2, 7, 5)];
        let shape = ShapeMesh::new(&shapes, &ProjectZ::new(5.0)).unwrap();
        let cut = cut_from_model(plane(2.0), &shape, 0);
        assert_eq!(cut.aois.len(), 1);
        let mut patch = create_surface_patch(&cut.aois[0].faces, &cut.mesh, None);
        patch.is_whole_aoi = true;
        assert!(is_over_whole_expoly(&patch, &[cut.clone()]));
        patch.is_whole_aoi = false;
        assert!(!is_over_whole_expoly(&patch, &[cut]));
    }

    #[test]
    fn partial_outline_does_not_cover() {
        // The mesh ends inside the shape, so part of the outline is open.
        let shapes = vec![rect(1, 2, 7, 5)];
        let shape = ShapeMesh::new(&shapes, &ProjectZ::new(5.0)).unwrap();
        let half = HalfEdgeMesh::from_triangles(
            vec![p(-10.0, -10.0, 2.0), p(5.0, -10.0, 2.0), p(5.0, 20.0, 2.0), p(-10.0, 20.0, 2.0)],
            &[[0, 1, 3], [1, 2, 3]],
        );
        let cut = cut_from_model(half, &shape, 0);
        assert_eq!(cut.aois.len(), 1);
        let mut patch = create_surface_patch(&cut.aois[0].faces, &cut.mesh, None);
        patch.is_whole_aoi = true;
        assert!(!is_over_whole_expoly(&patch, &[cut]));
    }

    // ── unprojection ──

    #[test]
    fn loops_unproject_to_patch_area() {
        let patch = flat_patch(0.0, 0.0, 10.0, 5.0, 2.0, 0);
        let mut depth = empty_depth_range();
        let area = to_expoly(&patch, &ProjectZ::new(5.0), &mut depth);
        assert!((area.area() - 50.0).abs() < 1e-9);
        assert!((depth.0 - 2.0).abs() < 1e-12 && (depth.1 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn short_loop_is_skipped() {
        let mut patch = flat_patch(0.0, 0.0, 10.0, 5.0, 2.0, 0);
        patch.loops = vec![vec![VertexId::new(0), VertexId::new(1)]];
        let mut depth = empty_depth_range();
        assert!(unproject_loops(&patch, &ProjectZ::new(5.0), &mut depth).is_empty());
        assert_eq!(to_expoly(&patch, &ProjectZ::new(5.0), &mut depth), ExPolygon::default());
    }

    // ── selection ──

    #[test]
    fn unused_patch_fills_uncovered_rest() {
        let shapes = vec![rect(0, 0, 10, 10)];
        let s2i = ExPolygonsIndices::new(&shapes);
        let bb = BoundingBox::new(pt(0, 0), pt(10, 10));
        let patches = vec![
            flat_patch(0.0, 0.0, 10.0, 5.0, 2.0, 0),
            flat_patch(0.0, 5.0, 10.0, 10.0, 3.0, 0),
            flat_patch(0.0, 5.0, 10.0, 10.0, 4.5, 0),
        ];
        let best = vec![chosen(0), chosen(0), None, None];
        let mask = select_patches(&best, &patches, &shapes, &bb, &s2i, &[], &ProjectZ::new(5.0));
        // The nearer depth wins; the rest is then covered.
        assert_eq!(mask, vec![true, true, false]);
    }

    #[test]
    fn all_used_patches_are_kept_as_is() {
        let shapes = vec![rect(0, 0, 10, 10)];
        let s2i = ExPolygonsIndices::new(&shapes);
        let bb = BoundingBox::new(pt(0, 0), pt(10, 10));
        let patches = vec![
            flat_patch(0.0, 0.0, 10.0, 5.0, 2.0, 0),
            flat_patch(0.0, 5.0, 10.0, 10.0, 3.0, 0),
        ];
        let best = vec![chosen(0), chosen(0), chosen(1), chosen(1)];
        let mask = select_patches(&best, &patches, &shapes, &bb, &s2i, &[], &ProjectZ::new(5.0));
        assert_eq!(mask, vec![true, true]);
    }

    #[test]
    fn covered_shape_adds_nothing() {
        let shapes = vec![rect(0, 0, 10, 10)];
        let s2i = ExPolygonsIndices::new(&shapes);
        let bb = BoundingBox::new(pt(0, 0), pt(10, 10));
        let patches = vec![
            flat_patch(-1.0, -1.0, 11.0, 11.0, 2.0, 0),
            flat_patch(0.0, 5.0, 10.0, 10.0, 3.0, 0),
        ];
        let best = vec![chosen(0), chosen(0), chosen(0), chosen(0)];
        let mask = select_patches(&best, &patches, &shapes, &bb, &s2i, &[], &ProjectZ::new(5.0));
        assert_eq!(mask, vec![true, false]);
    }
}
