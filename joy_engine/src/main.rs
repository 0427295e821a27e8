use anyhow::Result;
use env_logger::Env;
use joy_engine::{cli, runtime};

fn main() -> Result<()> {
    let config = cli::parse()?;

    let default_filter = if config.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let summary = runtime::execute(config)?;
    let stats = summary.stats;
    println!(
        "Dispatched {} callback(s) (skipped {}, failed {}, ignored {} event(s))",
        stats.called, stats.skipped, stats.failed, stats.ignored
    );
    println!(
        "Samples loaded {} (rejected {}, failed {}) | images loaded {} (rejected {}, failed {})",
        summary.samples.loaded,
        summary.samples.rejected,
        summary.samples.failed,
        summary.images.loaded,
        summary.images.rejected,
        summary.images.failed
    );
    Ok(())
}
