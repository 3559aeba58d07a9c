//! Inspection hooks for the cut pipeline.

use crate::geometry::ExPolygon;
use crate::topology::TriangleMesh;

use super::classify::ModelCut;
use super::merge::SurfaceCut;
use super::patch::SurfacePatch;
use super::shape_mesh::ShapeMesh;

/// Named point of the pipeline reached by [`cut_surface_with_sink`].
///
/// [`cut_surface_with_sink`]: super::cut_surface_with_sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    ModelsCulled,
    ShapeMesh,
    Aois,
    Patches,
    Result,
}

/// Receiver of intermediate pipeline data. Every method does nothing by
/// default.
pub trait DebugSink {
    fn checkpoint(&mut self, _checkpoint: Checkpoint) {}

    fn models_culled(&mut self, _models: &[TriangleMesh]) {}

    fn shape_mesh(&mut self, _shapes: &[ExPolygon], _mesh: &ShapeMesh) {}

    fn aois(&mut self, _cuts: &[ModelCut]) {}

    fn patches(&mut self, _patches: &[SurfacePatch]) {}

    fn result(&mut self, _cut: &SurfaceCut) {}
}

/// Sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DebugSink for NoopSink {}
