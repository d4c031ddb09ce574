use std::path::PathBuf;

use docker_retag::{Config, Image};

use crate::Result;

#[derive(clap::Args)]
pub struct Args {
    image_file: PathBuf,
}

pub fn run(args: &Args, config: &Config) -> Result<()> {
    let mut image = Image::open_with(&args.image_file, config)?;

    let repos = image.repositories();
    let closed = image.close();
    let repos = repos?;
    closed?;

    match repos {
        Some(repos) => println!("{}", serde_json::to_string_pretty(&repos)?),
        None => println!("{} has no repositories file", args.image_file.display()),
    }

    Ok(())
}
