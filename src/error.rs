use thiserror::Error;

/// Top-level error type for the surfcut library.
#[derive(Debug, Error)]
pub enum SurfcutError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Tessellation(#[from] TessellationError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("projection is not affine")]
    NotAffine,
}

/// Errors related to mesh topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("{entity} index {index} is out of range (count {count})")]
    IndexOutOfRange {
        entity: &'static str,
        index: usize,
        count: usize,
    },
}

/// Errors caused by invalid caller input.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Errors related to triangulation.
#[derive(Debug, Error)]
pub enum TessellationError {
    #[error("tessellation failed: {0}")]
    Failed(String),
}

/// Convenience type alias for results using [`SurfcutError`].
pub type Result<T> = std::result::Result<T, SurfcutError>;
