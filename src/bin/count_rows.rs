use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use store_migration::config::MigrationConfig;
use store_migration::loader::{Dataset, SourceLoader};

/// Counts the data rows of every file in a migration config, per store.
#[derive(Parser)]
#[command(name = "count_rows")]
struct Args {
    #[arg(short, long, default_value = "src/configs/migracao.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = MigrationConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    let loader = SourceLoader::new(&config);

    for dataset in [Dataset::Customers, Dataset::Sales] {
        let mut total = 0;
        let mut failed = 0;

        for source in loader.sources(dataset) {
            match loader.load_source(&source) {
                Ok(df) => {
                    let kind = source.kind.map(|k| k.as_str()).unwrap_or(dataset.label());
                    println!(
                        "{:<12} {:<10} {:>8}  {}",
                        source.store.code,
                        kind,
                        df.height(),
                        source.path.display()
                    );
                    total += df.height();
                }
                Err(e) => {
                    error!("Failed to read {}: {:#}", source.path.display(), e);
                    failed += 1;
                }
            }
        }

        info!("Total {} rows: {} ({} files failed)", dataset.label(), total, failed);
    }

    Ok(())
}
