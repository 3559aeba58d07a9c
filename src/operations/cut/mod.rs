//! Cutting of model surfaces by projected shapes.
//!
//! The pipeline runs in stages:
//!
//! 1. culling drops triangles out of the shapes' extruded bounding box and
//!    triangles seen at a grazing angle,
//! 2. every model is corefined with the shape walls and its faces are
//!    classified into areas of interest,
//! 3. the areas become patches and the parts hidden inside other models are
//!    clipped away,
//! 4. one patch depth is chosen for every shape point and the patches
//!    supplying those depths are selected,
//! 5. the selected patches are merged into one [`SurfaceCut`].
//!
//! Bad geometry never makes the cut fail: the result is empty or partial and
//! the reason is logged.

pub mod classify;
pub mod clip;
pub mod corefine;
pub mod culling;
pub mod debug;
pub mod diff;
pub mod distance;
pub mod merge;
pub mod patch;
pub mod reduce;
pub mod select;
pub mod shape_mesh;

pub use classify::{cut_from_model, CutAoi, FaceType, ModelCut};
pub use clip::NegativeModel;
pub use culling::{cut_area_of_interest, mask_triangles};
pub use debug::{Checkpoint, DebugSink, NoopSink};
pub use merge::{merge_patches, SurfaceCut};
pub use patch::SurfacePatch;
pub use shape_mesh::{ElementKind, IntersectingElement, ShapeMesh};

use tracing::{debug, warn};

use crate::geometry::polygon::bounding_box_of;
use crate::geometry::ExPolygon;
use crate::operations::projection::Project;
use crate::topology::{HalfEdgeMesh, TriangleMesh};

use culling::{set_skip_by_angle, set_skip_for_out_of_aoi_with, OUT_OF_AOI_EPSILON};

/// Tuning of the cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutParams {
    /// Triangles whose normal is farther than this from the projection
    /// direction are not cut.
    pub max_angle_deg: f64,
    /// Tolerance of the bounding planes used for culling.
    pub out_of_aoi_epsilon: f64,
}

impl Default for CutParams {
    fn default() -> Self {
        Self {
            max_angle_deg: 89.9,
            out_of_aoi_epsilon: OUT_OF_AOI_EPSILON,
        }
    }
}

/// Cuts the surfaces of `models` by `shapes` seen through a projection.
pub struct CutSurface<'a, P: ?Sized> {
    shapes: &'a [ExPolygon],
    models: &'a [TriangleMesh],
    projection: &'a P,
    projection_ratio: f64,
    params: CutParams,
}

impl<'a, P: Project + ?Sized> CutSurface<'a, P> {
    /// `projection_ratio` is the preferred depth of the cut between the front
    /// (0) and the back (1) of the projection.
    #[must_use]
    pub fn new(
        shapes: &'a [ExPolygon],
        models: &'a [TriangleMesh],
        projection: &'a P,
        projection_ratio: f64,
    ) -> Self {
        Self {
            shapes,
            models,
            projection,
            projection_ratio,
            params: CutParams::default(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: CutParams) -> Self {
        self.params = params;
        self
    }

    /// Runs the cut, reporting every stage to `sink`.
    pub fn execute(&self, sink: &mut dyn DebugSink) -> SurfaceCut {
        let (shapes, projection) = (self.shapes, self.projection);
        if self.models.is_empty() || shapes.is_empty() {
            return SurfaceCut::default();
        }
        let Some(shapes_bb) = bounding_box_of(shapes) else {
            return SurfaceCut::default();
        };

        let mut culled = Vec::with_capacity(self.models.len());
        let mut negatives = Vec::with_capacity(self.models.len());
        for model in self.models {
            let mut skip = vec![false; model.indices.len()];
            set_skip_for_out_of_aoi_with(
                &mut skip,
                model,
                projection,
                &shapes_bb,
                self.params.out_of_aoi_epsilon,
            );
            negatives.push(NegativeModel::new(
                HalfEdgeMesh::from_mesh(model, &skip, true).to_triangle_mesh(),
            ));
            set_skip_by_angle(&mut skip, model, projection, self.params.max_angle_deg);
            culled.push(HalfEdgeMesh::from_mesh(model, &skip, false));
        }
        sink.checkpoint(Checkpoint::ModelsCulled);
        let culled_meshes: Vec<TriangleMesh> =
            culled.iter().map(HalfEdgeMesh::to_triangle_mesh).collect();
        sink.models_culled(&culled_meshes);

        let shape_mesh = match ShapeMesh::new(shapes, projection) {
            Ok(mesh) => mesh,
            Err(err) => {
                warn!(%err, "projection can not extrude the shapes");
                return SurfaceCut::default();
            }
        };
        sink.checkpoint(Checkpoint::ShapeMesh);
        sink.shape_mesh(shapes, &shape_mesh);

        let cuts: Vec<ModelCut> = culled
            .into_iter()
            .enumerate()
            .map(|(model_index, model)| cut_from_model(model, &shape_mesh, model_index))
            .collect();
        debug!(
            aois = cuts.iter().map(|c| c.aois.len()).sum::<usize>(),
            "areas of interest"
        );
        sink.checkpoint(Checkpoint::Aois);
        sink.aois(&cuts);

        let mut patches = diff::diff_models(&cuts, &negatives, projection);
        sink.checkpoint(Checkpoint::Patches);
        sink.patches(&patches);
        if patches.is_empty() {
            return SurfaceCut::default();
        }

        let s2i = shape_mesh.indices();
        for patch in &mut patches {
            patch.shape_id = s2i.expolygon_of(patch.shape_id);
        }

        let distances =
            distance::calc_distances(&patches, &cuts, &shape_mesh, self.projection_ratio);
        let best = distance::choose_best_distance(
            &distances,
            shapes,
            shapes_bb.center(),
            s2i,
            &patches,
        );
        let mask = select::select_patches(
            &best, &patches, shapes, &shapes_bb, s2i, &cuts, projection,
        );
        debug!(
            selected = mask.iter().filter(|&&used| used).count(),
            patches = patches.len(),
            "patches selected"
        );

        let result = merge_patches(&patches, &mask);
        sink.checkpoint(Checkpoint::Result);
        sink.result(&result);
        result
    }
}

/// Cuts the surfaces of `models` by `shapes` with default parameters.
///
/// Returns an empty cut when nothing of the models lies under the shapes.
#[must_use]
pub fn cut_surface<P: Project + ?Sized>(
    shapes: &[ExPolygon],
    models: &[TriangleMesh],
    projection: &P,
    projection_ratio: f64,
) -> SurfaceCut {
    CutSurface::new(shapes, models, projection, projection_ratio).execute(&mut NoopSink)
}

/// [`cut_surface`] reporting the intermediate data to `sink`.
#[must_use]
pub fn cut_surface_with_sink<P: Project + ?Sized>(
    shapes: &[ExPolygon],
    models: &[TriangleMesh],
    projection: &P,
    projection_ratio: f64,
    sink: &mut dyn DebugSink,
) -> SurfaceCut {
    CutSurface::new(shapes, models, projection, projection_ratio).execute(sink)
}
