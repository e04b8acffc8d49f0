use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "sequence",
    version,
    about = "5D image sequence core: histograms, settings and plugin repositories"
)]
pub(super) struct Cli {
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(super) enum Commands {
    /// Loads every configured plugin repository and prints the merged list.
    Plugins {
        #[arg(long)]
        config: PathBuf,
    },
    /// Builds a histogram of the whitespace separated numbers of a text file.
    Histogram {
        #[arg(long)]
        min: f64,
        #[arg(long)]
        max: f64,
        #[arg(long, default_value_t = 256)]
        bins: usize,
        #[arg(long)]
        integer: bool,
        #[arg(long)]
        input: PathBuf,
        /// `.xls`/`.xlsx` writes a workbook, anything else tab separated text.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Prints the effective settings, defaults included.
    Settings {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
