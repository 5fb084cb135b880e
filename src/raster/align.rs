use geo::{Coord, Rect};
use ndarray::Array2;

use crate::crs::CrsTransform;
use crate::error::{PipelineError, Result};
use crate::raster::{Grid, GridDef};

/// Points sampled along each extent edge when reprojecting a bounding box.
/// Projected edges curve, so corners alone under-estimate the footprint.
const EDGE_SAMPLES: usize = 16;

/// Align `secondary` to `reference`: reproject, crop both to their common
/// extent, and resample `secondary` onto the reference pixel grid.
///
/// Resampling is nearest-neighbor by construction (each output cell takes the
/// value of the source cell containing its center). The secondary grid carries
/// ordinal intensity classes, and any interpolating method would fabricate
/// intermediate categories that do not exist.
///
/// Returns `(cropped reference, aligned secondary)` sharing one definition.
pub fn align(reference: &Grid, secondary: &Grid) -> Result<(Grid, Grid)> {
    let ref_def = reference.def();
    let sec_def = secondary.def();
    let same_crs = ref_def.crs == sec_def.crs;

    // Secondary footprint expressed in the reference CRS.
    let sec_extent = if same_crs {
        sec_def.extent()
    } else {
        let to_ref = CrsTransform::new(&sec_def.crs, &ref_def.crs)?;
        reproject_extent(&to_ref, sec_def.extent())?
    };

    let common = intersect(ref_def.extent(), sec_extent).ok_or_else(|| {
        PipelineError::EmptyIntersection {
            context: format!(
                "reference extent {:?}, secondary extent {:?}",
                ref_def.extent(),
                sec_extent
            ),
        }
    })?;

    // Snap the common extent outward to whole reference cells. The epsilon
    // keeps exact cell-edge hits from drifting one cell under float error.
    let eps = 1e-9 * ref_def.cell;
    let col0 = ((common.min().x - ref_def.origin.x + eps) / ref_def.cell).floor().max(0.0) as usize;
    let col1 = (((common.max().x - ref_def.origin.x - eps) / ref_def.cell).ceil() as usize)
        .min(ref_def.width);
    let row0 = ((ref_def.origin.y - common.max().y + eps) / ref_def.cell).floor().max(0.0) as usize;
    let row1 = (((ref_def.origin.y - common.min().y - eps) / ref_def.cell).ceil() as usize)
        .min(ref_def.height);
    if col1 <= col0 || row1 <= row0 {
        return Err(PipelineError::EmptyIntersection {
            context: "common extent narrower than one reference cell".to_string(),
        });
    }

    let cropped = reference.crop(row0, row1, col0, col1)?;
    let aligned = resample_nearest(secondary, cropped.def(), same_crs)?;
    Ok((cropped, aligned))
}

/// Nearest-neighbor resample of `source` onto `target` (a definition in the
/// reference CRS). Cells whose center falls outside the source footprint, or
/// on a missing source cell, come out as NaN.
fn resample_nearest(source: &Grid, target: &GridDef, same_crs: bool) -> Result<Grid> {
    let to_source = if same_crs {
        None
    } else {
        Some(CrsTransform::new(&target.crs, &source.def().crs)?)
    };

    let src = source.def();
    let mut data = Array2::from_elem((target.height, target.width), f64::NAN);
    for row in 0..target.height {
        for col in 0..target.width {
            let center = target.cell_center(row, col);
            let (x, y) = match &to_source {
                Some(t) => t.apply(center.x, center.y)?,
                None => (center.x, center.y),
            };
            let (sr, sc) = (src.row_at(y), src.col_at(x));
            if sr < 0 || sc < 0 || sr >= src.height as i64 || sc >= src.width as i64 {
                continue;
            }
            let v = source.get(sr as usize, sc as usize);
            if !source.is_missing(v) {
                data[(row, col)] = v;
            }
        }
    }
    Grid::new(target.clone(), data, None)
}

/// Bounding box of a reprojected extent, from sampled boundary points.
fn reproject_extent(t: &CrsTransform, extent: Rect<f64>) -> Result<Rect<f64>> {
    let (min, max) = (extent.min(), extent.max());
    let (mut x0, mut y0) = (f64::INFINITY, f64::INFINITY);
    let (mut x1, mut y1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for i in 0..=EDGE_SAMPLES {
        let f = i as f64 / EDGE_SAMPLES as f64;
        let edge_points = [
            (min.x + f * (max.x - min.x), min.y),
            (min.x + f * (max.x - min.x), max.y),
            (min.x, min.y + f * (max.y - min.y)),
            (max.x, min.y + f * (max.y - min.y)),
        ];
        for (px, py) in edge_points {
            let (tx, ty) = t.apply(px, py)?;
            x0 = x0.min(tx);
            y0 = y0.min(ty);
            x1 = x1.max(tx);
            y1 = y1.max(ty);
        }
    }
    Ok(Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 }))
}

/// Geographic intersection of two extents; `None` when degenerate (zero area).
fn intersect(a: Rect<f64>, b: Rect<f64>) -> Option<Rect<f64>> {
    let x0 = a.min().x.max(b.min().x);
    let y0 = a.min().y.max(b.min().y);
    let x1 = a.max().x.min(b.max().x);
    let y1 = a.max().y.min(b.max().y);
    (x1 > x0 && y1 > y0).then(|| Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 }))
}
