use anyhow::{bail, Result};

use crate::cli::{Cli, InspectArgs};
use crate::crs::Crs;
use crate::io::asc;
use crate::vector::read_polygon_layer;

/// Print a quick summary of a raster or polygon layer.
pub fn run(_cli: &Cli, args: &InspectArgs) -> Result<()> {
    match args.path.extension().and_then(|e| e.to_str()) {
        Some("asc") => inspect_raster(args),
        Some("shp") => inspect_layer(args),
        _ => bail!("unsupported file type: {} (expected .asc or .shp)", args.path.display()),
    }
}

fn inspect_raster(args: &InspectArgs) -> Result<()> {
    let grid = asc::read_grid(&args.path, Crs::parse(&args.crs)?)?;
    let def = grid.def();
    let extent = def.extent();
    println!("Raster: {}", args.path.display());
    println!("  size: {} x {} cells of {}", def.width, def.height, def.cell);
    println!(
        "  extent: ({}, {}) - ({}, {})",
        extent.min().x,
        extent.min().y,
        extent.max().x,
        extent.max().y
    );
    println!("  crs: {}", def.crs.proj4_string());

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in grid.data().iter() {
        if !grid.is_missing(v) {
            min = min.min(v);
            max = max.max(v);
        }
    }
    let missing = grid.count_missing();
    if missing == def.width * def.height {
        println!("  values: all missing");
    } else {
        println!("  values: min {min}, max {max}, sum {}", grid.sum_valid());
    }
    println!("  missing cells: {missing}");
    Ok(())
}

fn inspect_layer(args: &InspectArgs) -> Result<()> {
    let layer = read_polygon_layer(&args.path, None)?;
    println!("Polygon layer: {}", args.path.display());
    println!("  features: {}", layer.len());

    let parts: usize = layer.geoms.iter().map(|mp| mp.0.len()).sum();
    println!("  polygon parts: {parts}");

    if let Some(record) = layer.records.first() {
        let mut names: Vec<String> =
            record.clone().into_iter().map(|(name, _value)| name).collect();
        names.sort_unstable();
        println!("  fields: {}", names.join(", "));
    }
    Ok(())
}
