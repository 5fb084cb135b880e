use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// Exposure-aggregation CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "quakepop", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full exposure pipeline and write augmented layers
    Exposure(ExposureArgs),

    /// Print a summary of a raster (.asc) or polygon layer (.shp)
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct ExposureArgs {
    /// Population density raster (.asc)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub population: PathBuf,

    /// Shaking intensity raster (.asc, continuous MMI)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub intensity: PathBuf,

    /// Ward polygon layer (.shp)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub wards: PathBuf,

    /// Township polygon layer (.shp)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub townships: PathBuf,

    /// Pipeline configuration (.json)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: PathBuf,

    /// Output directory for augmented layers and tables
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Overwrite existing outputs (off by default)
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// File to summarize (.asc or .shp)
    #[arg(value_hint = ValueHint::FilePath)]
    pub path: PathBuf,

    /// CRS to assume for rasters (the format carries none)
    #[arg(long, default_value = "EPSG:4326")]
    pub crs: String,
}
