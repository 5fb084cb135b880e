use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crs::Crs;
use crate::raster::{CategoryBound, CategorySet};

/// Pipeline configuration, loaded from JSON.
///
/// Holds everything that is configuration rather than data: the calibration
/// scalars, the intensity category boundaries, per-input CRS strings (the
/// file formats carry none), and the administrative output subsets.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Authoritative national population total (external census figure).
    pub authoritative_total: f64,
    /// Annual growth rate applied as one compounding step after calibration.
    pub annual_growth_rate: f64,
    /// Ordered intensity buckets, e.g. `< 7, = 7, = 8, = 9`.
    pub categories: Vec<CategoryBound>,
    #[serde(default = "default_crs")]
    pub population_crs: String,
    #[serde(default = "default_crs")]
    pub intensity_crs: String,
    #[serde(default = "default_crs")]
    pub layer_crs: String,
    /// One entry per output layer subset.
    pub outputs: Vec<OutputSpec>,
}

fn default_crs() -> String {
    "EPSG:4326".to_string()
}

/// Which input polygon layer an output subset draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Ward,
    Township,
}

/// One augmented output: a named subset of a polygon layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSpec {
    /// Output file stem (`<name>.shp`, `<name>.csv`).
    pub name: String,
    pub layer: LayerKind,
    /// Attribute field holding the top-level administrative name.
    pub field: String,
    /// Admin names to keep; matched by prefix so composite region names
    /// ("Shan (South)", "Shan (North)") group under one entry.
    pub values: Vec<String>,
    /// Attribute fields carried into the output table (names/codes).
    pub key_fields: Vec<String>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        // Fail fast on bad category boundaries, before any raster work.
        config.category_set()?;
        Ok(config)
    }

    /// Validated category boundaries.
    pub fn category_set(&self) -> Result<CategorySet> {
        Ok(CategorySet::new(self.categories.clone())?)
    }

    pub fn population_crs(&self) -> Result<Crs> {
        Ok(Crs::parse(&self.population_crs)?)
    }

    pub fn intensity_crs(&self) -> Result<Crs> {
        Ok(Crs::parse(&self.intensity_crs)?)
    }

    pub fn layer_crs(&self) -> Result<Crs> {
        Ok(Crs::parse(&self.layer_crs)?)
    }
}
