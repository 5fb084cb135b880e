//! ESRI ASCII grid (`.asc`) reading and writing.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::Coord;
use ndarray::Array2;

use crate::crs::Crs;
use crate::raster::{Grid, GridDef};

/// Read a single-band `.asc` raster. The format carries no CRS, so the caller
/// supplies one from configuration.
pub fn read_grid(path: &Path, crs: Crs) -> Result<Grid> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let mut ncols: Option<usize> = None;
    let mut nrows: Option<usize> = None;
    let mut xll: Option<(f64, bool)> = None; // (value, is_center)
    let mut yll: Option<(f64, bool)> = None;
    let mut cellsize: Option<f64> = None;
    let mut nodata: Option<f64> = None;
    let mut first_data_line: Option<String> = None;

    // Header: `key value` lines until the first row of cell values.
    for line in lines.by_ref() {
        let line = line.context("read error")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let key = parts.next().unwrap_or_default().to_ascii_lowercase();
        let value = parts.next();
        match (key.as_str(), value) {
            ("ncols", Some(v)) => ncols = Some(v.parse().context("bad ncols")?),
            ("nrows", Some(v)) => nrows = Some(v.parse().context("bad nrows")?),
            ("xllcorner", Some(v)) => xll = Some((v.parse().context("bad xllcorner")?, false)),
            ("yllcorner", Some(v)) => yll = Some((v.parse().context("bad yllcorner")?, false)),
            ("xllcenter", Some(v)) => xll = Some((v.parse().context("bad xllcenter")?, true)),
            ("yllcenter", Some(v)) => yll = Some((v.parse().context("bad yllcenter")?, true)),
            ("cellsize", Some(v)) => cellsize = Some(v.parse().context("bad cellsize")?),
            ("nodata_value", Some(v)) => nodata = Some(v.parse().context("bad NODATA_value")?),
            _ => {
                first_data_line = Some(trimmed.to_string());
                break;
            }
        }
    }

    let (Some(width), Some(height), Some(cell)) = (ncols, nrows, cellsize) else {
        bail!("{}: incomplete ASC header (need ncols/nrows/cellsize)", path.display());
    };
    let (Some((x0, x_center)), Some((y0, y_center))) = (xll, yll) else {
        bail!("{}: incomplete ASC header (need xll/yll)", path.display());
    };
    let x_min = if x_center { x0 - cell / 2.0 } else { x0 };
    let y_min = if y_center { y0 - cell / 2.0 } else { y0 };

    let mut values = Vec::with_capacity(width * height);
    let mut push_tokens = |line: &str| -> Result<()> {
        for token in line.split_whitespace() {
            values.push(token.parse::<f64>().with_context(|| format!("bad cell value: {token}"))?);
        }
        Ok(())
    };
    if let Some(line) = first_data_line {
        push_tokens(&line)?;
    }
    for line in lines {
        push_tokens(line.context("read error")?.trim())?;
    }
    if values.len() != width * height {
        bail!(
            "{}: expected {} cell values, found {}",
            path.display(),
            width * height,
            values.len()
        );
    }

    let def = GridDef {
        crs,
        origin: Coord { x: x_min, y: y_min + height as f64 * cell },
        cell,
        width,
        height,
    };
    let data = Array2::from_shape_vec((height, width), values).context("bad grid shape")?;
    Ok(Grid::new(def, data, nodata)?)
}

/// Write a grid as `.asc`. Missing cells are written as the grid's nodata
/// sentinel (or -9999 when the grid only marks missing with NaN).
pub fn write_grid(path: &Path, grid: &Grid) -> Result<()> {
    let def = grid.def();
    let nodata = grid.nodata().unwrap_or(-9999.0);
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "ncols {}", def.width)?;
    writeln!(out, "nrows {}", def.height)?;
    writeln!(out, "xllcorner {}", def.origin.x)?;
    writeln!(out, "yllcorner {}", def.origin.y - def.height as f64 * def.cell)?;
    writeln!(out, "cellsize {}", def.cell)?;
    writeln!(out, "NODATA_value {nodata}")?;
    for row in 0..def.height {
        let mut line = String::new();
        for col in 0..def.width {
            if col > 0 {
                line.push(' ');
            }
            let v = grid.get(row, col);
            if grid.is_missing(v) {
                line.push_str(&nodata.to_string());
            } else {
                line.push_str(&v.to_string());
            }
        }
        writeln!(out, "{line}")?;
    }
    Ok(())
}
