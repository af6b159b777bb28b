use anyhow::{Context, Result};
use clap::Parser;

use mapquery::app::{Cli, run};
use mapquery::config::RuntimeConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("CLI: Failed to initialize thread pool")?;
    }

    let runtime = RuntimeConfig {
        threads: cli.threads,
        skip_unsupported: cli.skip_unsupported,
    };

    let start = std::time::Instant::now();
    let match_count = run(&cli, &runtime)?;

    let elapsed = start.elapsed();
    tracing::info!(
        "Done! Written {} features in {:.2}s",
        match_count,
        elapsed.as_secs_f64()
    );

    Ok(())
}
