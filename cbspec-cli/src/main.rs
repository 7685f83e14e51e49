//! cbspec CLI - Command-line interface for cosmic-ray spectrum reduction.
//!
//! Reduces MC and data reconstruction files into binned counts, aperture and
//! exposure, and inspects individual result files.
#![allow(clippy::uninlined_format_args)]

use cbspec_core::config::{ArrayType, RunConfig};
use cbspec_io::{run_spectrum_logged, write_results, EventFileReader, SpectrumResult};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    CbspecIo(#[from] cbspec_io::Error),

    #[error("{0}")]
    Core(#[from] cbspec_core::Error),
}

/// Surface-detector array selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Array {
    #[value(name = "TASD", alias = "tasd")]
    Tasd,
    #[value(name = "CBSD", alias = "cbsd")]
    Cbsd,
}

impl From<Array> for ArrayType {
    fn from(array: Array) -> Self {
        match array {
            Array::Tasd => ArrayType::Tasd,
            Array::Cbsd => ArrayType::Cbsd,
        }
    }
}

/// Cosmic-ray energy spectrum reduction.
#[derive(Parser)]
#[command(name = "cbspec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce the configured MC and data files into aperture and exposure
    Run {
        /// YAML configuration file
        #[arg(short, long, default_value = "config/default_config.yaml")]
        config: PathBuf,

        /// Override the array type from the configuration
        #[arg(short, long, value_enum)]
        array: Option<Array>,

        /// Rows per fetched batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Batches reduced concurrently
        #[arg(long)]
        parallelism: Option<usize>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a result file
    Info {
        /// Input Parquet file
        input: PathBuf,

        /// Rows per batch used for the batch count
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        log::error!("{err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            config,
            array,
            batch_size,
            parallelism,
            verbose,
        } => {
            init_logging(verbose);
            let config = load_config(&config, array, batch_size, parallelism)?;
            let files = config.files()?;
            println!("Array: {}", config.array_type());
            println!("MC file: {}", files.mc_file.display());
            println!("Data file: {}", files.dt_file.display());

            let start = Instant::now();
            let run = run_spectrum_logged(&config)?;
            let elapsed = start.elapsed();
            let written = write_results(&config.output.runs_dir, &run.result)?;

            print_summary(&run.result);
            println!();
            println!("Processing time: {:.2}s", elapsed.as_secs_f64());
            println!("Bin table: {}", written.bins_csv.display());
            println!("Summary: {}", written.summary_json.display());
            match (&run.text_log, &run.json_log) {
                (Some(text), Some(json)) => {
                    println!("Run log: {} ({})", text.display(), json.display());
                    if run.failed_log_writes > 0 {
                        println!("Run log writes failed: {}", run.failed_log_writes);
                    }
                }
                _ => println!("Run log: unavailable"),
            }
        }

        Commands::Info { input, batch_size } => {
            init_logging(false);
            let reader = match batch_size {
                Some(size) => EventFileReader::open_with_batch_size(&input, size)?,
                None => EventFileReader::open(&input)?,
            };

            println!("File: {}", input.display());
            println!("Rows: {}", reader.num_rows());
            match reader.schema_variant() {
                Ok(variant) => println!("Tree type: {}", variant),
                Err(err) => println!("Tree type: unknown ({err})"),
            }
            println!(
                "Batches: {} of up to {} rows",
                reader.batch_count(),
                reader.batch_size()
            );
            println!("Columns:");
            for name in reader.column_names() {
                println!("  {}", name);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn load_config(
    path: &Path,
    array: Option<Array>,
    batch_size: Option<usize>,
    parallelism: Option<usize>,
) -> Result<RunConfig> {
    let mut config = RunConfig::from_file(path)?;
    if let Some(array) = array {
        config = config.with_array_type(array.into())?;
    }
    let mut read = config.read;
    if let Some(size) = batch_size {
        read = read.with_batch_size(size);
    }
    if let Some(n) = parallelism {
        read = read.with_parallelism(n);
    }
    Ok(config.with_read_options(read)?)
}

fn print_summary(result: &SpectrumResult) {
    println!();
    println!(
        "MC: {} rows in {} batches, {} accepted",
        result.mc_summary.rows, result.mc_summary.batches, result.mc_summary.accepted
    );
    println!(
        "Data: {} rows in {} batches, {} accepted",
        result.data_summary.rows, result.data_summary.batches, result.data_summary.accepted
    );

    println!();
    println!(
        "{:<5} {:>8} {:>10} {:>10} {:>10} {:>14} {:>14}",
        "Bin", "log10E", "MC reco", "Data", "MC thrown", "Aperture", "Exposure"
    );
    println!("{:-<77}", "");
    if result.masked.is_empty() {
        println!("(no bins pass the validity mask)");
        return;
    }
    let bins = &result.masked;
    let ae = &result.aperture_exposure;
    for i in 0..bins.len() {
        println!(
            "{:<5} {:>8.2} {:>10} {:>10} {:>10} {:>14.4e} {:>14.4e}",
            bins.bin_index[i],
            bins.centers[i],
            bins.mc_reconstructed[i],
            bins.data_reconstructed[i],
            bins.mc_raw_truth[i],
            ae.aperture[i],
            ae.exposure[i]
        );
    }
}
