//! klv-ingest: derive a catalog metacard from a KLV metadata stream.
//!
//! Reads a file of concatenated KLV packets, accumulates the configured
//! fields per epoch and writes the merged parent metacard as JSON.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{error, info, warn};

mod config;
mod ingest;
mod logging;
mod reader;

use config::ConfigFile;
use ingest::{IngestSettings, Ingester};

const DEFAULT_CONFIG: &str = "klv-ingest.toml";

/// klv-ingest - Derive a metacard from a KLV metadata stream
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file of KLV packets ("-" for stdin)
    input: PathBuf,

    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Maximum footprint samples kept per epoch
    #[arg(short = 'n', long)]
    subsample: Option<usize>,

    /// Packets per epoch (0 = whole stream)
    #[arg(long)]
    interval: Option<usize>,

    /// Parent metacard id
    #[arg(long)]
    id: Option<String>,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory where log files are stored
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Number of days to keep log files
    #[arg(long)]
    log_retention_days: Option<u64>,
}

fn read_input(path: &Path) -> io::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data)?;
        Ok(data)
    } else {
        fs::read(path)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Explicit path > auto-detect > defaults
    let config_path = args.config.clone().or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG);
        default_path.exists().then_some(default_path)
    });
    let file_config = match &config_path {
        Some(path) => match ConfigFile::load(path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e.into());
            }
        },
        None => ConfigFile::default(),
    };

    // Command line takes precedence
    let log_dir = args
        .log_dir
        .clone()
        .or_else(|| file_config.logging.log_dir.as_ref().map(PathBuf::from));
    let log_retention_days = args
        .log_retention_days
        .or(file_config.logging.retention_days)
        .unwrap_or(7);
    let log_level = if args.verbose {
        "debug"
    } else {
        file_config.logging.level.as_deref().unwrap_or("info")
    };
    logging::init_logging(log_dir.as_deref(), log_retention_days, log_level)?;

    let settings = IngestSettings {
        metacard_id: args
            .id
            .clone()
            .or_else(|| file_config.ingest.metacard_id.clone())
            .unwrap_or_else(|| "klv".to_string()),
        subsample_count: args.subsample.or(file_config.ingest.subsample_count),
        interval_packets: args
            .interval
            .or(file_config.ingest.interval_packets)
            .unwrap_or(0),
        universal_key: file_config.universal_key()?,
    };

    if file_config.handlers.is_empty() {
        warn!("No handlers configured; the metacard will carry no attributes");
    }
    let session = file_config.session()?;
    let updaters = file_config.updaters();
    info!(
        "{} handlers, {} updaters, {} dictionary fields",
        session.handlers().len(),
        updaters.len(),
        file_config.fields.len()
    );

    let data = match read_input(&args.input) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to read {}: {}", args.input.display(), e);
            return Err(e.into());
        }
    };
    info!("Read {} bytes from {}", data.len(), args.input.display());

    let mut ingester = Ingester::new(session, file_config.fields, updaters, settings);
    let (metacard, summary) = ingester.run(&data);
    info!(
        "Done: {} packets ({} malformed), {} epochs, {} elements routed, {} decode errors, {} bytes skipped ({} resyncs)",
        summary.packets,
        summary.malformed_packets,
        summary.epochs,
        summary.elements_routed,
        summary.decode_errors,
        summary.skipped_bytes,
        summary.resyncs
    );

    let json = serde_json::to_string_pretty(&metacard)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)?;
            info!("Metacard written to {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }

    Ok(())
}
