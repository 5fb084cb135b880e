use anyhow::{Context, Result};

use crate::cli::{Cli, ExposureArgs};
use crate::config::{LayerKind, PipelineConfig};
use crate::io::asc;
use crate::raster::{align, classify, rescale_population};
use crate::vector::read_polygon_layer;
use crate::{report, zonal};

/// Run the whole pipeline: rescale -> align -> classify -> aggregate ->
/// report, once per configured output subset.
pub fn run(cli: &Cli, args: &ExposureArgs) -> Result<()> {
    let log = |msg: &str| {
        if cli.verbose > 0 {
            eprintln!("[exposure] {msg}");
        }
    };

    let config = PipelineConfig::load(&args.config)?;
    let categories = config.category_set()?;

    let raw_population = asc::read_grid(&args.population, config.population_crs()?)
        .context("reading population raster")?;
    let intensity =
        asc::read_grid(&args.intensity, config.intensity_crs()?).context("reading intensity raster")?;
    log(&format!(
        "population {}x{}, intensity {}x{}",
        raw_population.def().width,
        raw_population.def().height,
        intensity.def().width,
        intensity.def().height
    ));

    // Calibrate on the full raster before any cropping; the authoritative
    // total is national, not regional.
    let population = rescale_population(
        &raw_population,
        config.authoritative_total,
        config.annual_growth_rate,
    )
    .context("calibrating population raster")?;
    log(&format!("calibrated population total: {:.0}", population.sum_valid()));

    let (population, intensity) =
        align(&population, &intensity).context("aligning intensity to population grid")?;
    log(&format!(
        "aligned to common grid {}x{}",
        population.def().width,
        population.def().height
    ));

    let classification = classify(&intensity);
    let masks = categories.masks(&classification);
    let labels = categories.labels();

    let layer_crs = config.layer_crs()?;
    let target_crs = &population.def().crs;
    let wards = read_polygon_layer(&args.wards, Some(layer_crs.clone()))
        .context("reading ward layer")?
        .reproject(target_crs)?;
    let townships = read_polygon_layer(&args.townships, Some(layer_crs))
        .context("reading township layer")?
        .reproject(target_crs)?;
    log(&format!("{} wards, {} townships", wards.len(), townships.len()));

    for output in &config.outputs {
        let source = match output.layer {
            LayerKind::Ward => &wards,
            LayerKind::Township => &townships,
        };
        let subset = source
            .filter_by_field(&output.field, &output.values)
            .with_context(|| format!("filtering '{}' on field {}", output.name, output.field))?;
        log(&format!("{}: {} features", output.name, subset.len()));

        let sums = zonal::aggregate(&subset, &population, &masks)
            .with_context(|| format!("aggregating '{}'", output.name))?;
        report::write_output(
            &args.out,
            &output.name,
            &subset,
            &sums,
            &labels,
            &output.key_fields,
            args.force,
        )
        .with_context(|| format!("writing '{}'", output.name))?;
        println!("Wrote {} -> {}", output.name, args.out.display());
    }
    Ok(())
}
