#![doc = "Quakepop public API"]
pub mod cli;
pub mod commands;
mod config;
mod crs;
mod error;
pub mod io;
mod raster;
mod report;
mod vector;
mod zonal;

#[doc(inline)]
pub use config::{LayerKind, OutputSpec, PipelineConfig};

#[doc(inline)]
pub use crs::{Crs, CrsTransform};

#[doc(inline)]
pub use error::PipelineError;

#[doc(inline)]
pub use raster::{
    align, classify, rescale_population, CategoryBound, CategoryMask, CategorySet, Grid, GridDef,
};

#[doc(inline)]
pub use vector::{read_polygon_layer, write_polygon_layer, FieldDef, FieldKind, PolygonLayer};

#[doc(inline)]
pub use zonal::{aggregate, area_weighted_sum, ZonalRecord};

#[doc(inline)]
pub use report::{build_table, write_output};
