//! Area-weighted zonal aggregation: the numerical core of the pipeline.
//!
//! Administrative boundaries routinely bisect raster cells at the resolutions
//! involved, so cells are weighted by the exact fraction of their footprint a
//! polygon covers. Centroid or all-or-nothing inclusion would systematically
//! miscount boundary population.

use geo::{Area, BooleanOps, BoundingRect, Contains, Intersects, MultiPolygon};
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::raster::{CategoryMask, Grid};
use crate::vector::PolygonLayer;

/// Population sums for one polygon: total plus one entry per category mask,
/// in mask order.
#[derive(Debug, Clone)]
pub struct ZonalRecord {
    pub total: f64,
    pub categories: Vec<f64>,
}

/// Exact area-weighted sum of grid values covered by `polygon`.
///
/// Cells fully inside contribute their whole value; cells cut by the boundary
/// contribute `value * covered_area / cell_area`. A polygon entirely outside
/// the grid footprint sums to 0 (not an error, not missing) so that
/// downstream percentage computation stays well-defined.
pub fn area_weighted_sum(polygon: &MultiPolygon<f64>, grid: &Grid) -> f64 {
    let Some(bbox) = polygon.bounding_rect() else {
        return 0.0;
    };
    let def = grid.def();
    let col0 = def.col_at(bbox.min().x).max(0);
    let col1 = def.col_at(bbox.max().x).min(def.width as i64 - 1);
    let row0 = def.row_at(bbox.max().y).max(0);
    let row1 = def.row_at(bbox.min().y).min(def.height as i64 - 1);
    if col1 < col0 || row1 < row0 {
        return 0.0;
    }

    let cell_area = def.cell_area();
    let mut sum = 0.0;
    for row in row0..=row1 {
        for col in col0..=col1 {
            let value = grid.get(row as usize, col as usize);
            if grid.is_missing(value) || value == 0.0 {
                continue;
            }
            let cell = def.cell_rect(row as usize, col as usize).to_polygon();
            if !polygon.intersects(&cell) {
                continue;
            }
            let weight = if polygon.contains(&cell) {
                1.0
            } else {
                polygon.intersection(&cell).unsigned_area() / cell_area
            };
            sum += value * weight;
        }
    }
    sum
}

/// Aggregate the population grid over every polygon in the layer: one total
/// per polygon plus one area-weighted sum per category mask (the elementwise
/// product of population and mask, then the same extraction).
///
/// Output order matches the layer's feature order; callers join by position.
/// Polygons are independent and the grids are read-only, so the per-polygon
/// work runs in parallel.
pub fn aggregate(
    layer: &PolygonLayer,
    population: &Grid,
    masks: &[CategoryMask],
) -> Result<Vec<ZonalRecord>> {
    let crs = layer.crs.as_ref().ok_or_else(|| {
        PipelineError::SpatialReferenceMismatch("polygon layer has no CRS".to_string())
    })?;
    if *crs != population.def().crs {
        return Err(PipelineError::SpatialReferenceMismatch(format!(
            "polygon layer CRS ({}) differs from population grid CRS ({}); reproject first",
            crs.proj4_string(),
            population.def().crs.proj4_string()
        )));
    }

    let masked: Vec<Grid> = masks
        .iter()
        .map(|mask| population.masked_by(&mask.grid))
        .collect::<Result<_>>()?;

    Ok(layer
        .geoms
        .par_iter()
        .map(|polygon| ZonalRecord {
            total: area_weighted_sum(polygon, population),
            categories: masked.iter().map(|grid| area_weighted_sum(polygon, grid)).collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::raster::GridDef;
    use approx::assert_relative_eq;
    use geo::{polygon, Coord};
    use ndarray::Array2;

    fn pop_grid(width: usize, height: usize, value: f64) -> Grid {
        let def = GridDef {
            crs: Crs::wgs84(),
            origin: Coord { x: 0.0, y: height as f64 },
            cell: 1.0,
            width,
            height,
        };
        Grid::new(def, Array2::from_elem((height, width), value), None).unwrap()
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
        ]])
    }

    #[test]
    fn full_coverage_sums_everything() {
        let grid = pop_grid(3, 3, 10.0);
        let poly = square(0.0, 0.0, 3.0, 3.0);
        assert_relative_eq!(area_weighted_sum(&poly, &grid), 90.0, max_relative = 1e-9);
    }

    #[test]
    fn half_cell_counts_half_population() {
        let grid = pop_grid(1, 1, 10.0);
        let poly = square(0.0, 0.0, 0.5, 1.0);
        assert_relative_eq!(area_weighted_sum(&poly, &grid), 5.0, max_relative = 1e-9);
    }

    #[test]
    fn boundary_cells_are_fractional() {
        // 2x2 grid of 10, polygon covers left column plus half the right one.
        let grid = pop_grid(2, 2, 10.0);
        let poly = square(0.0, 0.0, 1.5, 2.0);
        assert_relative_eq!(area_weighted_sum(&poly, &grid), 30.0, max_relative = 1e-9);
    }

    #[test]
    fn disjoint_polygon_sums_to_zero() {
        let grid = pop_grid(2, 2, 10.0);
        let poly = square(10.0, 10.0, 12.0, 12.0);
        assert_eq!(area_weighted_sum(&poly, &grid), 0.0);
    }

    #[test]
    fn missing_cells_contribute_nothing() {
        let def = pop_grid(2, 1, 0.0).def().clone();
        let grid = Grid::new(def, ndarray::array![[10.0, f64::NAN]], None).unwrap();
        let poly = square(0.0, 0.0, 2.0, 1.0);
        assert_relative_eq!(area_weighted_sum(&poly, &grid), 10.0, max_relative = 1e-9);
    }

    #[test]
    fn aggregate_requires_matching_crs() {
        let grid = pop_grid(2, 2, 10.0);
        let layer = PolygonLayer {
            crs: None,
            geoms: vec![square(0.0, 0.0, 1.0, 1.0)],
            records: vec![Default::default()],
        };
        match aggregate(&layer, &grid, &[]) {
            Err(PipelineError::SpatialReferenceMismatch(_)) => {}
            other => panic!("expected SpatialReferenceMismatch, got {other:?}"),
        }
    }

    #[test]
    fn aggregate_preserves_feature_order() {
        let grid = pop_grid(4, 1, 1.0);
        let layer = PolygonLayer {
            crs: Some(Crs::wgs84()),
            geoms: vec![
                square(0.0, 0.0, 1.0, 1.0),
                square(0.0, 0.0, 3.0, 1.0),
                square(0.0, 0.0, 2.0, 1.0),
            ],
            records: vec![Default::default(); 3],
        };
        let records = aggregate(&layer, &grid, &[]).unwrap();
        let totals: Vec<f64> = records.iter().map(|r| r.total).collect();
        assert_relative_eq!(totals[0], 1.0, max_relative = 1e-9);
        assert_relative_eq!(totals[1], 3.0, max_relative = 1e-9);
        assert_relative_eq!(totals[2], 2.0, max_relative = 1e-9);
    }
}
