//! Metrics collection and registry.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric could not be created, registered or encoded.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    /// The metrics file could not be written.
    #[error("failed to write metrics file: {0}")]
    Io(#[from] std::io::Error),
}

/// Prometheus metrics registry for conversion runs.
///
/// Counters are updated by the converter as files complete.
pub struct MetricsRegistry {
    registry: Registry,

    // Files
    files_converted: IntCounter,
    files_failed: IntCounterVec,

    // Output
    frames_total: IntCounter,
    arrays_written: IntCounter,
    bytes_written: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new registry with all conversion metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let files_converted = IntCounter::new(
            "csi_npy_files_converted_total",
            "Capture files converted successfully",
        )?;
        let files_failed = IntCounterVec::new(
            Opts::new("csi_npy_files_failed_total", "Capture files that failed to convert"),
            &["kind"],
        )?;
        let frames_total = IntCounter::new(
            "csi_npy_frames_total",
            "Frames assembled into output arrays",
        )?;
        let arrays_written = IntCounter::new(
            "csi_npy_arrays_written_total",
            "Output files written",
        )?;
        let bytes_written = IntCounter::new(
            "csi_npy_bytes_written_total",
            "Bytes written to output files",
        )?;

        registry.register(Box::new(files_converted.clone()))?;
        registry.register(Box::new(files_failed.clone()))?;
        registry.register(Box::new(frames_total.clone()))?;
        registry.register(Box::new(arrays_written.clone()))?;
        registry.register(Box::new(bytes_written.clone()))?;

        Ok(Self {
            registry,
            files_converted,
            files_failed,
            frames_total,
            arrays_written,
            bytes_written,
        })
    }

    /// Records a converted file.
    pub fn record_converted(&self, frames: usize, files: usize, bytes: u64) {
        self.files_converted.inc();
        self.frames_total.inc_by(frames as u64);
        self.arrays_written.inc_by(files as u64);
        self.bytes_written.inc_by(bytes);
    }

    /// Records a failed file under its error kind.
    pub fn record_failed(&self, kind: &str) {
        self.files_failed.with_label_values(&[kind]).inc();
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Writes the text exposition to a file, for node-exporter style collection.
    pub fn write_textfile(&self, path: impl AsRef<Path>) -> Result<(), MetricsError> {
        let text = self.encode()?;
        std::fs::write(path.as_ref(), text)?;
        tracing::debug!(path = %path.as_ref().display(), "Wrote metrics file");
        Ok(())
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("files_converted", &self.files_converted.get())
            .field("frames_total", &self.frames_total.get())
            .field("bytes_written", &self.bytes_written.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        registry.record_converted(120, 4, 4096);
        registry.record_converted(30, 4, 1024);
        registry.record_failed("unknown-configuration");

        let output = registry.encode().unwrap();
        assert!(output.contains("csi_npy_files_converted_total 2"));
        assert!(output.contains("csi_npy_frames_total 150"));
        assert!(output.contains("csi_npy_bytes_written_total 5120"));
        assert!(output.contains("csi_npy_files_failed_total{kind=\"unknown-configuration\"} 1"));
    }

    #[test]
    fn test_write_textfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csi_npy.prom");
        let registry = MetricsRegistry::new().unwrap();
        registry.record_converted(1, 1, 80);

        registry.write_textfile(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("csi_npy_arrays_written_total 1"));
    }
}
