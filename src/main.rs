use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use store_migration::MigrationPipeline;
use store_migration::pipeline::RunOptions;
use store_migration::processor::validators::Cpf;
use store_migration::storage::{MemorySink, PostgresSink};

#[derive(Parser)]
#[command(name = "store-migration")]
#[command(about = "Migrates legacy store spreadsheets into the customer and sales database")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load, clean and import every configured store
    Run {
        /// Path to the migration config file
        #[arg(short, long, default_value = "src/configs/migracao.toml")]
        config: PathBuf,

        /// Validate and write reports without touching the database
        #[arg(long)]
        dry_run: bool,

        /// Skip the report files
        #[arg(long)]
        no_output: bool,
    },
    /// List "how did you hear about us" answers that match no channel
    Channels {
        #[arg(short, long, default_value = "src/configs/migracao.toml")]
        config: PathBuf,
    },
    /// Validate CPF numbers
    CheckCpf {
        values: Vec<String>,

        /// Do not restore leading zeros lost by spreadsheets
        #[arg(long)]
        no_pad: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let args = Args::parse();

    match args.command {
        Command::Run {
            config,
            dry_run,
            no_output,
        } => run(config, dry_run, !no_output).await,
        Command::Channels { config } => channels(config),
        Command::CheckCpf { values, no_pad } => {
            check_cpf(&values, !no_pad);
            Ok(())
        }
    }
}

async fn run(config: PathBuf, dry_run: bool, write_outputs: bool) -> Result<()> {
    let pipeline = MigrationPipeline::from_config_file(&config)
        .with_context(|| format!("Failed to load configuration from {}", config.display()))?;
    let options = RunOptions {
        dry_run,
        write_outputs,
    };

    let result = if dry_run {
        info!("🧪 Dry run: nothing will be written to the database");
        let sink = MemorySink::from_config(pipeline.config(), pipeline.catalog())?;
        pipeline.run(&sink, options).await
    } else {
        let sink = PostgresSink::connect(pipeline.config())
            .await
            .context("Please check the database settings and the DATABASE_URL environment variable")?;
        pipeline.run(&sink, options).await
    };

    match result {
        Ok(report) => {
            if report.total_issues() > 0 {
                warn!("⚠️  Migration finished with {} issues", report.total_issues());
            } else {
                info!("✅ Migration finished without issues");
            }
            Ok(())
        }
        Err(e) => {
            error!("❌ Migration failed: {:#}", e);
            Err(e)
        }
    }
}

fn channels(config: PathBuf) -> Result<()> {
    let pipeline = MigrationPipeline::from_config_file(&config)
        .with_context(|| format!("Failed to load configuration from {}", config.display()))?;

    let unmapped = pipeline.unmapped_channels()?;
    if unmapped.is_empty() {
        info!("✅ Every channel answer matches the catalog");
        return Ok(());
    }

    warn!("{} distinct answers match no channel", unmapped.len());
    for channel in &unmapped {
        println!("{:>6}  {}", channel.ocorrencias, channel.valor);
    }

    Ok(())
}

fn check_cpf(values: &[String], pad_zeros: bool) {
    for value in values {
        match Cpf::parse(value, pad_zeros) {
            Ok(cpf) => println!("✅ {} -> {}", value, cpf.formatted()),
            Err(e) => println!("❌ {}: {}", value, e),
        }
    }
}
