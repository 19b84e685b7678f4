use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(name = "median-composite")]
#[command(about = "Per-pixel median composite of partially overlapping rasters")]
#[command(version)]
pub struct Args {
    /// YAML configuration file (log level via RUST_LOG)
    #[arg(value_name = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}
