use indicatif::{ProgressBar, ProgressStyle};
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::time::Duration;

use docker_retag::{Config, Image};

use crate::Result;

#[derive(clap::Args)]
pub struct Args {
    /// Uncompressed image tar, as written by `docker save`
    image_file: PathBuf,
    /// New repository name
    name: String,
}

pub fn run(args: &Args, config: &Config) -> Result<()> {
    let mut image = Image::open_with(&args.image_file, config)?;

    let pb = if shows_spinner(log::max_level()) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };
    pb.set_message(format!("Retagging {}", args.image_file.display()));

    let renamed = image.set_name(&args.name);
    pb.finish_and_clear();

    let closed = image.close();
    let repos = renamed?;
    closed?;

    info!("Retagged {} as {}", args.image_file.display(), args.name);
    println!("{}", serde_json::to_string_pretty(&repos)?);

    Ok(())
}

/// Log lines and the spinner share stderr; only spin when logging is quiet.
fn shows_spinner(level: LevelFilter) -> bool {
    level <= LevelFilter::Warn
}
