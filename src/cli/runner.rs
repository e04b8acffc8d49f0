use std::fs;
use std::path::Path;

use clap::Parser;
use serde_json::json;

use crate::math::Histogram;
use crate::model::DynamicArray;
use crate::runtime::{AppContext, AppError, Result, Settings, load_settings};

use super::types::{Cli, Commands};

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plugins { config } => {
            let ctx = AppContext::with_settings(load_settings(&config)?)?;
            let loader = ctx.plugin_loader()?;
            loader.wait_loaded();
            if loader.failed() {
                log::warn!("plugin list is incomplete: a repository could not be read");
            }
            let plugins = loader.plugins();
            println!("{}", serde_json::to_string_pretty(plugins.as_slice())?);
        }
        Commands::Histogram {
            min,
            max,
            bins,
            integer,
            input,
            output,
        } => {
            let samples = read_samples(&input)?;
            let mut histogram = Histogram::new(min, max, bins, integer)?;
            histogram.add_values(&samples.as_array(), false);
            match output {
                Some(path) => {
                    histogram.export(&path)?;
                    println!(
                        "{}",
                        json!({"status": "ok", "samples": samples.size(), "output": path})
                    );
                }
                None => print!("{}", histogram.csv_formatted_data()),
            }
        }
        Commands::Settings { config } => {
            let settings = match config {
                Some(path) => load_settings(path)?,
                None => Settings::default(),
            };
            println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
        }
    }

    Ok(())
}

fn read_samples(path: &Path) -> Result<DynamicArray<f64>> {
    let raw = fs::read_to_string(path)?;
    let mut samples = DynamicArray::new();
    for token in raw.split_whitespace() {
        let value = token.parse::<f64>().map_err(|error| {
            AppError::Config(format!("{}: bad sample '{token}': {error}", path.display()))
        })?;
        samples.add_single(value);
    }
    log::debug!("read {} sample(s) from {}", samples.size(), path.display());
    Ok(samples)
}
