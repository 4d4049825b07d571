use std::path::PathBuf;

use clap::Parser;
use log::error;

mod app;

/// Headless viewer driver: decodes a structure file, partitions it into
/// chunks, meshes the visible set, and reports what a GPU shell would draw.
#[derive(Parser, Debug)]
#[command(name = "ashlar", version)]
struct Args {
    /// Structure file (.schem or vanilla structure NBT), optionally gzipped.
    file: PathBuf,

    /// Quality preset name (low, medium, high, or one from --quality-config).
    #[arg(long, default_value = "medium")]
    quality: String,

    /// Optional TOML file with quality preset overrides.
    #[arg(long)]
    quality_config: Option<PathBuf>,

    /// Mesh worker count; defaults to available parallelism.
    #[arg(long)]
    workers: Option<usize>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(e) = app::run(&args) {
        error!("{e}");
        std::process::exit(1);
    }
}
