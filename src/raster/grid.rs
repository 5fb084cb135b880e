use geo::{Coord, Rect};
use ndarray::Array2;

use crate::crs::Crs;
use crate::error::{PipelineError, Result};

/// Grid definition: where the cells sit on the Earth.
///
/// `origin` is the top-left (north-west) corner of the top-left cell; rows run
/// south, columns run east. Cells are square. Two grids can be combined
/// elementwise only when their definitions are equal.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDef {
    pub crs: Crs,
    pub origin: Coord<f64>,
    pub cell: f64,
    pub width: usize,
    pub height: usize,
}

impl GridDef {
    /// Full geographic extent covered by the grid.
    pub fn extent(&self) -> Rect<f64> {
        Rect::new(
            Coord { x: self.origin.x, y: self.origin.y - self.height as f64 * self.cell },
            Coord { x: self.origin.x + self.width as f64 * self.cell, y: self.origin.y },
        )
    }

    /// Center coordinate of cell (row, col).
    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        Coord {
            x: self.origin.x + (col as f64 + 0.5) * self.cell,
            y: self.origin.y - (row as f64 + 0.5) * self.cell,
        }
    }

    /// Geographic footprint of cell (row, col).
    pub fn cell_rect(&self, row: usize, col: usize) -> Rect<f64> {
        let x0 = self.origin.x + col as f64 * self.cell;
        let y1 = self.origin.y - row as f64 * self.cell;
        Rect::new(Coord { x: x0, y: y1 - self.cell }, Coord { x: x0 + self.cell, y: y1 })
    }

    pub fn cell_area(&self) -> f64 {
        self.cell * self.cell
    }

    /// Column index containing x, unclamped (may be out of range).
    pub fn col_at(&self, x: f64) -> i64 {
        ((x - self.origin.x) / self.cell).floor() as i64
    }

    /// Row index containing y, unclamped (may be out of range).
    pub fn row_at(&self, y: f64) -> i64 {
        ((self.origin.y - y) / self.cell).floor() as i64
    }
}

/// A single-band raster: a grid definition plus cell values.
///
/// Every transformation (rescale, mask, crop, resample) produces a new `Grid`;
/// inputs are never mutated. Missing cells are marked by the `nodata` sentinel
/// or by NaN, which is always treated as missing.
#[derive(Debug, Clone)]
pub struct Grid {
    def: GridDef,
    data: Array2<f64>,
    nodata: Option<f64>,
}

impl Grid {
    pub fn new(def: GridDef, data: Array2<f64>, nodata: Option<f64>) -> Result<Self> {
        let (rows, cols) = data.dim();
        if rows != def.height || cols != def.width {
            return Err(PipelineError::GridMismatch(format!(
                "data is {rows}x{cols} but definition says {}x{}",
                def.height, def.width
            )));
        }
        Ok(Self { def, data, nodata })
    }

    /// Grid of constant value, no nodata sentinel.
    pub fn filled(def: GridDef, value: f64) -> Self {
        let data = Array2::from_elem((def.height, def.width), value);
        Self { def, data, nodata: None }
    }

    pub fn def(&self) -> &GridDef {
        &self.def
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    /// True if the value is missing under this grid's sentinel convention.
    #[inline]
    pub fn is_missing(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// Sum of all non-missing cells.
    pub fn sum_valid(&self) -> f64 {
        self.data.iter().filter(|v| !self.is_missing(**v)).sum()
    }

    pub fn count_missing(&self) -> usize {
        self.data.iter().filter(|v| self.is_missing(**v)).count()
    }

    /// Elementwise transformation preserving the grid definition.
    pub fn map<F: Fn(f64) -> f64>(&self, nodata: Option<f64>, f: F) -> Self {
        Self { def: self.def.clone(), data: self.data.mapv(|v| f(v)), nodata }
    }

    /// Elementwise product with a 0/1 mask grid of identical definition.
    /// Missing cells in either input become 0 in the output.
    pub fn masked_by(&self, mask: &Grid) -> Result<Self> {
        if self.def != mask.def {
            return Err(PipelineError::GridMismatch(
                "mask definition differs from grid definition".to_string(),
            ));
        }
        let mut data = Array2::zeros(self.data.dim());
        ndarray::Zip::from(&mut data)
            .and(&self.data)
            .and(&mask.data)
            .for_each(|out, &v, &m| {
                *out = if self.is_missing(v) || mask.is_missing(m) { 0.0 } else { v * m };
            });
        Ok(Self { def: self.def.clone(), data, nodata: None })
    }

    /// Crop to the half-open cell window [row0, row1) x [col0, col1).
    pub fn crop(&self, row0: usize, row1: usize, col0: usize, col1: usize) -> Result<Self> {
        if row1 <= row0 || col1 <= col0 || row1 > self.def.height || col1 > self.def.width {
            return Err(PipelineError::GridMismatch(format!(
                "crop window [{row0}, {row1}) x [{col0}, {col1}) outside {}x{} grid",
                self.def.height, self.def.width
            )));
        }
        let def = GridDef {
            crs: self.def.crs.clone(),
            origin: Coord {
                x: self.def.origin.x + col0 as f64 * self.def.cell,
                y: self.def.origin.y - row0 as f64 * self.def.cell,
            },
            cell: self.def.cell,
            width: col1 - col0,
            height: row1 - row0,
        };
        let data = self.data.slice(ndarray::s![row0..row1, col0..col1]).to_owned();
        Ok(Self { def, data, nodata: self.nodata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn unit_def(width: usize, height: usize) -> GridDef {
        GridDef {
            crs: Crs::wgs84(),
            origin: Coord { x: 0.0, y: height as f64 },
            cell: 1.0,
            width,
            height,
        }
    }

    #[test]
    fn extent_and_cell_geometry() {
        let def = unit_def(3, 2);
        let ext = def.extent();
        assert_eq!(ext.min(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(ext.max(), Coord { x: 3.0, y: 2.0 });
        assert_eq!(def.cell_center(0, 0), Coord { x: 0.5, y: 1.5 });
        assert_eq!(def.cell_rect(1, 2).min(), Coord { x: 2.0, y: 0.0 });
    }

    #[test]
    fn row_col_lookup() {
        let def = unit_def(3, 3);
        assert_eq!(def.col_at(0.5), 0);
        assert_eq!(def.row_at(2.5), 0);
        assert_eq!(def.row_at(0.5), 2);
        assert_eq!(def.col_at(-0.1), -1);
    }

    #[test]
    fn sum_skips_nodata_and_nan() {
        let def = unit_def(2, 2);
        let data = array![[1.0, -9999.0], [2.0, f64::NAN]];
        let g = Grid::new(def, data, Some(-9999.0)).unwrap();
        assert_eq!(g.sum_valid(), 3.0);
        assert_eq!(g.count_missing(), 2);
    }

    #[test]
    fn masked_product_zeroes_missing() {
        let def = unit_def(2, 1);
        let g = Grid::new(def.clone(), array![[5.0, f64::NAN]], None).unwrap();
        let m = Grid::new(def, array![[1.0, 1.0]], None).unwrap();
        let out = g.masked_by(&m).unwrap();
        assert_eq!(out.get(0, 0), 5.0);
        assert_eq!(out.get(0, 1), 0.0);
    }

    #[test]
    fn crop_shifts_origin() {
        let def = unit_def(3, 3);
        let g = Grid::filled(def, 7.0);
        let c = g.crop(1, 3, 1, 2).unwrap();
        assert_eq!(c.def().width, 1);
        assert_eq!(c.def().height, 2);
        assert_eq!(c.def().origin, Coord { x: 1.0, y: 2.0 });
        assert!(g.crop(2, 2, 0, 1).is_err());
    }
}
