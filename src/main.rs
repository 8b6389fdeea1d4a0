use std::{env, process};

use anyhow::Result;
use env_logger::Env;
use log::info;

mod config;
mod experiment;

use config::ExperimentConfig;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("Usage: proxquant <experiment.json>");
        process::exit(1);
    };

    let config = ExperimentConfig::from_file(&path)?;
    let written = experiment::run(&config)?;

    info!("done, {} reports written to {}", written.len(), config.output_dir.display());
    Ok(())
}
