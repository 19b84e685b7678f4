use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use median_composite::cli::Args;
use median_composite::{CompositeConfig, CompositeError, Compositor, Result};
use std::process::ExitCode;

fn run(args: &Args) -> Result<()> {
    info!("Loading configuration: {}", args.config.display());
    let config = CompositeConfig::load(&args.config)?;

    // Set thread pool size if specified
    if let Some(n_threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()
            .map_err(|e| CompositeError::Configuration(format!("thread pool: {}", e)))?;
        info!("Using {} threads", n_threads);
    } else {
        info!("Using all available threads");
    }

    info!(
        "Input folder: {}, bands: {}, output: {} ({})",
        config.input_folder.display(),
        config.number_of_bands,
        config.output_path.display(),
        config.driver
    );

    let summary = Compositor::new(config).run()?;
    if summary.inputs_skipped > 0 {
        warn!("{} inputs were skipped", summary.inputs_skipped);
    }

    info!("=== Done! ===");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("=== Median Composite ===");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("median-composite: {}", e);
            ExitCode::FAILURE
        }
    }
}
