use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use store_migration::loader::SheetReader;
use store_migration::models::columns::is_provenance;
use store_migration::models::frame::string_values;
use store_migration::processor::FieldClassifier;

/// Shows how the headers of legacy files map to the canonical columns.
#[derive(Parser)]
#[command(name = "inspect_columns")]
struct Args {
    files: Vec<PathBuf>,

    #[arg(short, long, default_value_t = ';')]
    separator: char,

    /// Worksheet to read from workbooks (default: first)
    #[arg(long)]
    sheet: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let reader = SheetReader::new(args.separator, args.sheet);
    let classifier = FieldClassifier::new();

    for path in &args.files {
        info!("=== {} ===", path.display());

        let df = match reader.read(path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read {}: {:#}", path.display(), e);
                continue;
            }
        };

        for column in df.get_column_names() {
            if is_provenance(column) {
                continue;
            }

            let samples: Vec<String> = string_values(&df, column)?
                .into_iter()
                .flatten()
                .take(5)
                .collect();
            let canonical = classifier.classify_field(column, &samples)?;
            let marker = if canonical == column.as_str() { "  " } else { "->" };

            println!("   {:<30} {} {:<16} {:?}", column, marker, canonical, samples);
        }
    }

    Ok(())
}
