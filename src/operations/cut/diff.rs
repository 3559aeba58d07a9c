//! Differencing of the patches of several models.
//!
//! Every area of interest becomes a patch which is then clipped by every
//! other model. Parts hidden inside another model are dropped, clipped
//! patches are split into their connected pieces.

use slotmap::SlotMap;
use tracing::{debug, warn};

use super::classify::{CutAoi, ModelCut};
use super::clip::{clip_patch, NegativeModel};
use super::patch::{collect_open_edges, create_surface_patch, divide_patch, SurfacePatch};
use super::reduce::create_reduce_map;
use crate::math::aabb::Aabb3;
use crate::math::Vector3;
use crate::operations::projection::Project3d;

slotmap::new_key_type! {
    /// Identifier of a patch while one area of interest is differenced.
    pub struct PatchKey;
}

/// Patch with the state of the current differencing step.
#[derive(Debug)]
struct SurfacePatchEx {
    patch: SurfacePatch,
    just_clipped: bool,
    full_inside: bool,
}

impl SurfacePatchEx {
    fn new(patch: SurfacePatch) -> Self {
        Self {
            patch,
            just_clipped: false,
            full_inside: false,
        }
    }
}

/// Bounding box of the faces of one area of interest.
#[must_use]
pub fn aoi_bounding_box(cut: &ModelCut, aoi: &CutAoi) -> Aabb3 {
    let mesh = &cut.mesh;
    Aabb3::from_points(
        aoi.faces
            .iter()
            .flat_map(|&f| mesh.face_vertices(f))
            .map(|v| mesh.point(v)),
    )
}

/// Shape point index of the first tagged vertex on the outline.
#[must_use]
pub fn get_shape_point_index(cut: &ModelCut, aoi: &CutAoi) -> Option<u32> {
    aoi.outline
        .iter()
        .find_map(|&h| cut.tags[cut.mesh.source(h)])
        .map(|element| element.shape_point_index)
}

fn has_bb_intersection(bb: &Aabb3, model_boxes: &[Aabb3]) -> bool {
    model_boxes.iter().any(|other| bb.intersects(other, 0.0))
}

/// Projection direction at the first vertex of `patch`.
fn patch_direction<P: Project3d + ?Sized>(patch: &SurfacePatch, projection: &P) -> Option<Vector3> {
    let a = patch.mesh.points().first()?;
    let dir = projection.project(a) - a;
    (dir.norm_squared() > 0.0).then_some(dir)
}

/// Ray parity test of the first patch vertex against `model`, cast along
/// the projection and cross-checked against the opposite direction.
#[must_use]
pub fn is_patch_inside_of_model<P: Project3d + ?Sized>(
    patch: &SurfacePatch,
    model: &NegativeModel,
    projection: &P,
) -> bool {
    let (Some(a), Some(dir)) = (patch.mesh.points().first(), patch_direction(patch, projection))
    else {
        return false;
    };
    let inside = model.is_inside(a, &dir);
    if model.is_inside(a, &-dir) != inside {
        warn!(
            model_id = patch.model_id,
            aoi_id = patch.aoi_id,
            "ray parity disagrees, model is not closed around the patch"
        );
    }
    inside
}

/// Turns the areas of interest of every model into patches and removes the
/// parts covered by the other models.
///
/// `negatives[i]` is the flipped, culled copy of model `i`. Shape ids of the
/// returned patches are flat shape point indices.
#[must_use]
pub fn diff_models<P: Project3d + ?Sized>(
    cuts: &[ModelCut],
    negatives: &[NegativeModel],
    projection: &P,
) -> Vec<SurfacePatch> {
    let bbs: Vec<Vec<Aabb3>> = cuts
        .iter()
        .map(|cut| cut.aois.iter().map(|aoi| aoi_bounding_box(cut, aoi)).collect())
        .collect();

    let mut patches: Vec<SurfacePatch> = Vec::new();
    let mut aoi_patches: SlotMap<PatchKey, SurfacePatchEx> = SlotMap::with_key();
    for (model_index, cut) in cuts.iter().enumerate() {
        if cut.aois.is_empty() {
            continue;
        }
        let reduction = create_reduce_map(&cut.mesh, &cut.tags, &cut.constrained);
        for (aoi_index, aoi) in cut.aois.iter().enumerate() {
            let Some(shape_id) = get_shape_point_index(cut, aoi) else {
                debug!(model_index, aoi_index, "area without shape tag skipped");
                continue;
            };
            let mut patch = create_surface_patch(&aoi.faces, &cut.mesh, Some(&reduction));
            if patch.mesh.is_empty() {
                continue;
            }
            patch.bb = bbs[model_index][aoi_index];
            patch.model_id = model_index;
            patch.aoi_id = aoi_index;
            patch.shape_id = shape_id;
            patch.is_whole_aoi = true;

            aoi_patches.clear();
            aoi_patches.insert(SurfacePatchEx::new(patch));
            for (other_index, negative) in negatives.iter().enumerate() {
                if other_index == model_index {
                    continue;
                }
                let other_boxes = bbs.get(other_index).map_or(&[][..], Vec::as_slice);
                for part in aoi_patches.values_mut() {
                    let clipped = has_bb_intersection(&part.patch.bb, other_boxes)
                        && patch_direction(&part.patch, projection)
                            .is_some_and(|dir| clip_patch(&mut part.patch, negative, &dir));
                    if clipped {
                        if part.patch.mesh.is_empty() {
                            part.full_inside = true;
                        } else {
                            part.just_clipped = true;
                        }
                    } else if is_patch_inside_of_model(&part.patch, negative, projection) {
                        part.full_inside = true;
                    }
                }
                aoi_patches.retain(|_, part| !part.full_inside);
                if aoi_patches.is_empty() {
                    break;
                }

                let clipped: Vec<PatchKey> = aoi_patches
                    .iter()
                    .filter(|(_, part)| part.just_clipped)
                    .map(|(key, _)| key)
                    .collect();
                for key in clipped {
                    let Some(part) = aoi_patches.remove(key) else {
                        continue;
                    };
                    for piece in divide_patch(part.patch) {
                        aoi_patches.insert(SurfacePatchEx::new(piece));
                    }
                }
            }
            patches.extend(aoi_patches.drain().map(|(_, part)| part.patch));
        }
    }

    collect_open_edges(&mut patches);
    debug!(patches = patches.len(), "patches after differencing");
    patches
}
