//! Prometheus metrics for conversion runs.
//!
//! The binary writes the registry in text exposition format to a file at
//! the end of a run, ready for a node-exporter textfile collector.
//!
//! # Metrics Exposed
//!
//! - `csi_npy_files_converted_total` - Capture files converted successfully
//! - `csi_npy_files_failed_total{kind}` - Failed files by error kind
//! - `csi_npy_frames_total` - Frames assembled
//! - `csi_npy_arrays_written_total` - Output files written
//! - `csi_npy_bytes_written_total` - Bytes written
//!
//! # Example
//!
//! ```no_run
//! use csi_npy::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! registry.record_converted(1200, 4, 3_456_789);
//! registry.write_textfile("csi_npy.prom").expect("Failed to write metrics");
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry};
