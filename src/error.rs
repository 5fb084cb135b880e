use thiserror::Error;

/// Failures the aggregation pipeline can report to callers.
///
/// Everything here is deterministic: a run either completes or fails with one
/// of these, and retrying without changing the inputs cannot help.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An input carries no CRS, or its CRS definition cannot be parsed, so it
    /// cannot be reconciled with the rest of the inputs.
    #[error("spatial reference cannot be reconciled: {0}")]
    SpatialReferenceMismatch(String),

    /// Two grids share no geographic overlap; alignment must not silently
    /// proceed with a degenerate extent.
    #[error("grids share no geographic overlap ({context})")]
    EmptyIntersection { context: String },

    /// The raw population raster sums to a non-positive total, so the
    /// calibration factor is undefined.
    #[error("population raster total is not positive: {raw_total}")]
    InvalidCalibration { raw_total: f64 },

    /// Configured category boundaries leave gaps or overlap.
    #[error("invalid category configuration: {0}")]
    CategoryConfiguration(String),

    /// Grid arithmetic was attempted on grids with different definitions.
    #[error("grid definitions differ: {0}")]
    GridMismatch(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
