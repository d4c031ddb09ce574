use std::path::PathBuf;

use docker_retag::{Config, Image};

use crate::Result;

#[derive(clap::Args)]
pub struct Args {
    image_file: PathBuf,
}

pub fn run(args: &Args, config: &Config) -> Result<()> {
    let mut image = Image::open_with(&args.image_file, config)?;

    let listed = image.inspect_layers().map(|layers| {
        for layer in layers {
            println!("{}  {}", layer.id(), layer.created().to_rfc3339());
        }
    });

    let closed = image.close();
    listed?;
    closed?;

    Ok(())
}
