//! CSI to NumPy conversion CLI
//!
//! Converts every decoded capture in a directory into per-kind `.npy`
//! arrays.

use clap::Parser;
use csi_npy::{
    capture::JsonLinesDecoder,
    convert::{ConvertConfig, Converter, FileConfig},
    extraction::OutputKind,
    metrics::MetricsRegistry,
    policy::SubcarrierPolicy,
};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "csi-npy", version)]
#[command(about = "Convert decoded CSI captures into NumPy arrays")]
struct Args {
    /// Directory containing capture files [default: in]
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory to write arrays to [default: out]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write complex CSI
    #[arg(short = 'c', long)]
    csi: bool,

    /// Write magnitude
    #[arg(short = 'm', long)]
    magnitude: bool,

    /// Write phase
    #[arg(short = 'p', long)]
    phase: bool,

    /// Write capture timestamps
    #[arg(short = 't', long)]
    timestamp: bool,

    /// Keep interpolated subcarriers
    #[arg(long)]
    interpolate: bool,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture file extension
    #[arg(long)]
    extension: Option<String>,

    /// Also write timestamps as RFC 3339 text
    #[arg(long)]
    timestamp_text: bool,

    /// Group each file's outputs under its first frame time
    #[arg(long)]
    group_by_start_time: bool,

    /// Stop at the first failing file
    #[arg(long)]
    fail_fast: bool,

    /// Write Prometheus metrics to this file when done
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

impl Args {
    fn selected_kinds(&self) -> Vec<OutputKind> {
        [
            (self.csi, OutputKind::Csi),
            (self.magnitude, OutputKind::Magnitude),
            (self.phase, OutputKind::Phase),
            (self.timestamp, OutputKind::Timestamp),
        ]
        .into_iter()
        .filter_map(|(selected, kind)| selected.then_some(kind))
        .collect()
    }

    /// Applies command-line overrides on top of file settings.
    fn apply(&self, config: &mut ConvertConfig) {
        if let Some(input) = &self.input {
            config.input_dir = input.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        let kinds = self.selected_kinds();
        if !kinds.is_empty() {
            config.kinds = kinds;
        }
        if let Some(extension) = &self.extension {
            config.input_extension = Some(extension.clone());
        }
        config.interpolate |= self.interpolate;
        config.timestamp_text |= self.timestamp_text;
        config.group_by_start_time |= self.group_by_start_time;
        config.fail_fast |= self.fail_fast;
    }
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("csi-npy v{}", csi_npy::VERSION);

    let file_config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                process::exit(2);
            }
        },
        None => FileConfig::default(),
    };

    let mut config = file_config.convert;
    args.apply(&mut config);
    let policy: SubcarrierPolicy = file_config.policy.build();

    let metrics = match args.metrics_file.as_ref().map(|_| MetricsRegistry::new()) {
        Some(Ok(registry)) => Some(registry),
        Some(Err(e)) => {
            warn!("Metrics disabled: {}", e);
            None
        }
        None => None,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Failed to install interrupt handler: {}", e);
    }

    let decoder = JsonLinesDecoder::new();
    let converter = match Converter::new(config, policy, &decoder) {
        Ok(converter) => converter,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            process::exit(2);
        }
    };
    let converter = match &metrics {
        Some(registry) => converter.with_metrics(registry),
        None => converter,
    };

    let summary = match converter.run(&cancel) {
        Ok(summary) => summary,
        Err(e) => {
            error!(kind = e.kind(), "{}", e);
            process::exit(2);
        }
    };

    for failed in &summary.failed {
        eprintln!("{}: {} ({})", failed.input.display(), failed.message, failed.kind);
    }

    if let (Some(path), Some(registry)) = (&args.metrics_file, &metrics) {
        if let Err(e) = registry.write_textfile(path) {
            warn!("Failed to write metrics: {}", e);
        }
    }

    if !summary.is_success() {
        process::exit(1);
    }
}
