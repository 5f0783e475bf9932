mod aggregate;
mod config;
mod demo;
mod error;
mod heuristics;
mod llm_extract;
mod pdf_extract;
mod pipeline;
mod receipt_store;
mod report;

use clap::{Parser, Subcommand};
use config::{Config, LlmBackend};
use pipeline::Pipeline;
use report::Report;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = ".config/receipt_tally.toml";

/// Extract company / total pairs from receipts and tally spend per company
#[derive(Parser)]
#[command(name = "receipt-tally")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every receipt in the input directory, aggregate and report
    Run {
        #[arg(short, long)]
        input_dir: Option<PathBuf>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[arg(short, long, value_enum)]
        backend: Option<LlmBackend>,
    },
    /// Extract a single receipt and print the record as JSON
    Extract {
        file: PathBuf,
        #[arg(short, long, value_enum)]
        backend: Option<LlmBackend>,
    },
    /// Aggregate one or more extracted-records files into a totals file
    Aggregate {
        /// Records file; repeat to merge several runs
        #[arg(short, long)]
        input: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the spending report from the saved output files
    Report,
    /// Write sample receipts into the input directory
    Demo {
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config, error::TallyError> {
    match path {
        Some(p) => Config::load(p),
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(DEFAULT_CONFIG),
        None => {
            info!("No config file — using defaults");
            Ok(Config::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // init tracing; RUST_LOG wins over -v
    let level = match cli.verbose {
        0 => "info",
        1 => "info,receipt_tally=debug",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let mut cfg = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            input_dir,
            output_dir,
            backend,
        } => {
            if let Some(dir) = input_dir {
                cfg.input_dir = dir;
            }
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            if let Some(b) = backend {
                cfg.llm.backend = b;
            }

            let pipeline = Pipeline::new(cfg).await?;
            info!(input_dir = %pipeline.config().input_dir.display(), "Starting receipt run");
            let outcome = pipeline.run().await?;
            println!(
                "\n{}",
                Report {
                    records: &outcome.records,
                    totals: &outcome.totals
                }
            );
        }
        Commands::Extract { file, backend } => {
            if let Some(b) = backend {
                cfg.llm.backend = b;
            }
            if !file.is_file() {
                return Err(error::TallyError::MissingInput(file).into());
            }
            let pipeline = Pipeline::new(cfg).await?;
            let record = pipeline.extract_document(&file).await;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Aggregate { input, output } => {
            let inputs = if input.is_empty() {
                vec![cfg.extracted_path()]
            } else {
                input
            };
            let output = output.unwrap_or_else(|| cfg.aggregated_path());
            let totals = pipeline::aggregate_files(&inputs, &output)?;
            println!("{}", serde_json::to_string_pretty(&totals)?);
        }
        Commands::Report => {
            let records = receipt_store::load_records(&cfg.extracted_path())?;
            let totals = receipt_store::load_totals(&cfg.aggregated_path())?;
            println!("{}", Report { records: &records, totals: &totals });
        }
        Commands::Demo { dir } => {
            let dir = dir.unwrap_or_else(|| cfg.input_dir.clone());
            let files = demo::write_sample_receipts(&dir)?;
            println!("Wrote {} sample receipts to {}", files.len(), dir.display());
        }
    }

    Ok(())
}
