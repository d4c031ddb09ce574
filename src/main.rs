use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use docker_retag::Config;

mod commands;

#[derive(Parser)]
#[command(version, about = "Rename Docker image archives in place")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Directory to create working copies in
    #[arg(long, global = true)]
    work_root: Option<PathBuf>,
    /// Give up waiting for the archive lock after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    lock_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the repository name of an image archive
    Retag(commands::retag::Args),
    /// List the layers of an image archive, newest first
    Layers(commands::layers::Args),
    /// Show the repository mapping of an image archive
    Inspect(commands::inspect::Args),
}

type Result<T> = std::result::Result<T, Box<dyn Error>>;

impl Cli {
    fn config(&self) -> Config {
        let mut config =
            Config::default().with_lock_timeout(self.lock_timeout.map(Duration::from_secs));
        if let Some(root) = &self.work_root {
            config = config.with_work_root(root);
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = cli.config();

    match &cli.command {
        Commands::Retag(args) => commands::retag::run(args, &config),
        Commands::Layers(args) => commands::layers::run(args, &config),
        Commands::Inspect(args) => commands::inspect::run(args, &config),
    }
}
