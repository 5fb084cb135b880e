use crate::error::{PipelineError, Result};
use crate::raster::Grid;

/// Calibrate a raw population raster against an authoritative national total,
/// then project it forward by one compounding growth step.
///
/// The raster's own total rarely matches the census figure, so every cell is
/// scaled by the same factor `(authoritative - raw) / raw` before the growth
/// rate is applied. Missing cells become zero: unmeasured area is modeled as
/// unpopulated rather than letting nodata propagate through the zonal sums.
/// The output therefore carries no nodata sentinel.
pub fn rescale_population(
    raw: &Grid,
    authoritative_total: f64,
    growth_rate: f64,
) -> Result<Grid> {
    let raw_total = raw.sum_valid();
    if !(raw_total > 0.0) {
        return Err(PipelineError::InvalidCalibration { raw_total });
    }
    let scale = (authoritative_total - raw_total) / raw_total;
    let factor = (1.0 + scale) * (1.0 + growth_rate);
    Ok(raw.map(None, |v| if raw.is_missing(v) { 0.0 } else { v * factor }))
}
