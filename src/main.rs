use anyhow::Result;
use clap::Parser;

use quakepop::cli::{Cli, Commands};
use quakepop::commands::{exposure, inspect};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Exposure(args) => exposure::run(&cli, args),
        Commands::Inspect(args) => inspect::run(&cli, args),
    }
}
