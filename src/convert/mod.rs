//! Directory conversion driver.
//!
//! Each capture file in the input directory is decoded, assembled and
//! written on its own. A failing file is reported with its name and error
//! kind; the run then moves on unless `fail_fast` is set. Cancellation is
//! checked between files, never inside one.

mod config;

pub use config::{ConfigError, ConvertConfig, FileConfig, PolicyConfig};

use crate::assembly::{AssembleError, AssembledBatch, BatchAssembler};
use crate::capture::{CaptureDecoder, DecodeError};
use crate::extraction::ExtractError;
use crate::metrics::MetricsRegistry;
use crate::policy::{PolicyError, SubcarrierPolicy};
use crate::store::{ArrayWriter, StoreError, WrittenFile};
use chrono::SecondsFormat;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{error, info, warn};

/// Conversion errors.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A capture file could not be decoded.
    #[error("{}: {source}", path.display())]
    Decode {
        /// Capture file being decoded.
        path: PathBuf,
        /// Decoder failure.
        #[source]
        source: DecodeError,
    },

    /// A decoded frame could not be assembled.
    #[error("{}: {source}", path.display())]
    Assemble {
        /// Capture file being assembled.
        path: PathBuf,
        /// Assembly failure.
        #[source]
        source: AssembleError,
    },

    /// An output file could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A directory could not be listed or created.
    #[error("{}: {source}", path.display())]
    Io {
        /// Directory or file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    /// Returns a stable short name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::Config(_) => "invalid-config",
            ConvertError::Decode { .. } => "decode-error",
            ConvertError::Assemble { source, .. } => match source {
                AssembleError::Extract { source, .. } => match source {
                    ExtractError::Policy(PolicyError::UnknownConfiguration { .. }) => {
                        "unknown-configuration"
                    }
                    ExtractError::Policy(PolicyError::SubcarrierNotFound { .. }) => {
                        "subcarrier-not-found"
                    }
                    ExtractError::UnsupportedKind(_) => "unsupported-kind",
                },
                AssembleError::NoKinds => "unsupported-kind",
                AssembleError::InconsistentShape { .. }
                | AssembleError::UnexpectedValue { .. }
                | AssembleError::Stack { .. } => "inconsistent-shape",
            },
            ConvertError::Store(StoreError::Write { .. }) => "write-error",
            ConvertError::Store(_) | ConvertError::Io { .. } => "io-error",
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        ConvertError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of one successfully converted file.
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Capture file that was converted.
    pub input: PathBuf,
    /// Frames assembled.
    pub frames: usize,
    /// Files written, in kind order.
    pub outputs: Vec<WrittenFile>,
}

impl FileReport {
    /// Total bytes written for this file.
    pub fn bytes(&self) -> u64 {
        self.outputs.iter().map(|file| file.bytes).sum()
    }
}

/// A file that failed to convert.
#[derive(Debug, Clone)]
pub struct FailedFile {
    /// Capture file that failed.
    pub input: PathBuf,
    /// Short error kind, see [`ConvertError::kind`].
    pub kind: &'static str,
    /// Full error message.
    pub message: String,
}

/// Outcome of a directory run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Files converted, in processing order.
    pub converted: Vec<FileReport>,
    /// Files that failed.
    pub failed: Vec<FailedFile>,
    /// Files never attempted because the run stopped early.
    pub skipped: usize,
    /// True if the run was interrupted.
    pub cancelled: bool,
}

impl RunSummary {
    /// Returns true if every discovered file converted.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled && self.skipped == 0
    }
}

/// Converts capture files into `.npy` arrays.
pub struct Converter<'a> {
    config: ConvertConfig,
    policy: SubcarrierPolicy,
    decoder: &'a dyn CaptureDecoder,
    metrics: Option<&'a MetricsRegistry>,
}

impl<'a> Converter<'a> {
    /// Creates a converter after validating the configuration.
    pub fn new(
        config: ConvertConfig,
        policy: SubcarrierPolicy,
        decoder: &'a dyn CaptureDecoder,
    ) -> Result<Self, ConvertError> {
        config.validate()?;
        Ok(Self {
            config,
            policy,
            decoder,
            metrics: None,
        })
    }

    /// Records run counters into `metrics`.
    pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the capture file extension being matched.
    pub fn extension(&self) -> &str {
        self.config
            .input_extension
            .as_deref()
            .map(|ext| ext.trim_start_matches('.'))
            .unwrap_or_else(|| self.decoder.extension())
    }

    /// Lists capture files in the input directory, sorted by name.
    pub fn discover(&self) -> Result<Vec<PathBuf>, ConvertError> {
        let dir = &self.config.input_dir;
        let extension = self.extension();

        let mut inputs = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| ConvertError::io(dir, e))? {
            let path = entry.map_err(|e| ConvertError::io(dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                inputs.push(path);
            }
        }
        inputs.sort();

        tracing::debug!(dir = %dir.display(), extension, count = inputs.len(), "Discovered capture files");
        Ok(inputs)
    }

    /// Converts one capture file.
    ///
    /// Nothing is written unless every frame assembles, and the kinds of
    /// one file are committed together: if any of them fails to write, none
    /// is left in the output directory.
    pub fn convert_file(&self, path: &Path) -> Result<FileReport, ConvertError> {
        let base = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ConvertError::io(path, io::Error::new(io::ErrorKind::InvalidInput, "no file name"))
            })?;

        let batch = self.assemble_file(path)?;

        let dir = self.output_dir_for(&batch);
        fs::create_dir_all(&dir).map_err(|e| ConvertError::io(&dir, e))?;
        let writer = ArrayWriter::new(dir).with_timestamp_text(self.config.timestamp_text);

        let outputs = writer.write_set(&base, batch.iter())?;

        Ok(FileReport {
            input: path.to_path_buf(),
            frames: batch.frame_count(),
            outputs,
        })
    }

    fn assemble_file(&self, path: &Path) -> Result<AssembledBatch, ConvertError> {
        let assemble_err = |source| ConvertError::Assemble {
            path: path.to_path_buf(),
            source,
        };
        let decode_err = |source| ConvertError::Decode {
            path: path.to_path_buf(),
            source,
        };

        let mut assembler = BatchAssembler::new(
            &self.policy,
            self.config.kinds.iter().copied(),
            self.config.interpolate,
        )
        .map_err(assemble_err)?;

        for frame in self.decoder.open(path).map_err(decode_err)? {
            let frame = frame.map_err(decode_err)?;
            assembler.push(&frame).map_err(assemble_err)?;
        }
        assembler.finish().map_err(assemble_err)
    }

    fn output_dir_for(&self, batch: &AssembledBatch) -> PathBuf {
        let root = self.config.output_dir.clone();
        if !self.config.group_by_start_time {
            return root;
        }
        match batch.start_time() {
            Some(start) => {
                let stamp = start
                    .to_rfc3339_opts(SecondsFormat::Nanos, true)
                    .replace(':', ";");
                root.join(format!("[{stamp}]"))
            }
            None => root,
        }
    }

    /// Converts every discovered file.
    ///
    /// Fails only if the output directory cannot be created or the input
    /// directory cannot be listed; per-file failures land in the summary.
    pub fn run(&self, cancel: &AtomicBool) -> Result<RunSummary, ConvertError> {
        let output_dir = &self.config.output_dir;
        fs::create_dir_all(output_dir).map_err(|e| ConvertError::io(output_dir, e))?;

        let inputs = self.discover()?;
        info!(
            input = %self.config.input_dir.display(),
            output = %output_dir.display(),
            files = inputs.len(),
            "Starting conversion"
        );

        let mut summary = RunSummary::default();
        for (position, path) in inputs.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                warn!("Interrupted, stopping before next file");
                summary.cancelled = true;
                summary.skipped = inputs.len() - position;
                break;
            }

            let name = path.file_name().unwrap_or_default().to_string_lossy();
            info!(file = %name, "Processing");
            match self.convert_file(path) {
                Ok(report) => {
                    info!(file = %name, frames = report.frames, bytes = report.bytes(), "Converted");
                    if let Some(metrics) = self.metrics {
                        metrics.record_converted(report.frames, report.outputs.len(), report.bytes());
                    }
                    summary.converted.push(report);
                }
                Err(e) => {
                    error!(file = %name, kind = e.kind(), error = %e, "Conversion failed");
                    if let Some(metrics) = self.metrics {
                        metrics.record_failed(e.kind());
                    }
                    summary.failed.push(FailedFile {
                        input: path.clone(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                    if self.config.fail_fast {
                        summary.skipped = inputs.len() - position - 1;
                        break;
                    }
                }
            }
        }

        info!(
            converted = summary.converted.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped,
            "Conversion finished"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for Converter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("policy_entries", &self.policy.len())
            .field("extension", &self.extension())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DeviceModel, FrameRecord, FrameStream, SyntheticCapture};
    use crate::extraction::OutputKind;
    use crate::store::NpyHeader;
    use std::collections::HashMap;

    /// Decoder serving prepared frames keyed by file stem.
    struct MockDecoder {
        captures: HashMap<String, Vec<FrameRecord>>,
    }

    impl MockDecoder {
        fn new() -> Self {
            Self {
                captures: HashMap::new(),
            }
        }

        fn with(mut self, stem: &str, frames: Vec<FrameRecord>) -> Self {
            self.captures.insert(stem.to_string(), frames);
            self
        }

        fn create_files(&self, dir: &Path) {
            for stem in self.captures.keys() {
                fs::write(dir.join(format!("{stem}.mock")), b"").unwrap();
            }
        }
    }

    impl CaptureDecoder for MockDecoder {
        fn extension(&self) -> &str {
            "mock"
        }

        fn open(&self, path: &Path) -> Result<FrameStream, DecodeError> {
            let stem = path.file_stem().unwrap().to_string_lossy();
            let frames = self.captures.get(stem.as_ref()).cloned().ok_or_else(|| {
                DecodeError::Io(io::Error::new(io::ErrorKind::NotFound, "no such capture"))
            })?;
            Ok(Box::new(frames.into_iter().map(Ok::<_, DecodeError>)))
        }
    }

    fn ax210_frames(count: usize) -> Vec<FrameRecord> {
        SyntheticCapture::new(DeviceModel::Ax210.code(), 40)
            .with_subcarriers((-57..=56).collect())
            .take_frames(count)
            .unwrap()
    }

    fn setup(decoder: &MockDecoder) -> (tempfile::TempDir, ConvertConfig) {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("in");
        fs::create_dir(&input).unwrap();
        decoder.create_files(&input);
        let config = ConvertConfig::with_dirs(input, root.path().join("out"));
        (root, config)
    }

    #[test]
    fn test_converts_all_kinds() {
        let decoder = MockDecoder::new().with("walk", ax210_frames(3));
        let (_root, config) = setup(&decoder);
        let out = config.output_dir.clone();
        let converter = Converter::new(config, SubcarrierPolicy::builtin(), &decoder).unwrap();

        let summary = converter.run(&AtomicBool::new(false)).unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.converted[0].frames, 3);

        let csi = NpyHeader::read_file(&out.join("walk.csi.npy")).unwrap();
        assert_eq!(csi.descr, "<c16");
        assert_eq!(csi.shape, vec![3, 111, 1, 2]);
        let times = NpyHeader::read_file(&out.join("walk.timestamp.npy")).unwrap();
        assert_eq!(times.descr, "<M8[ns]");
        assert_eq!(times.shape, vec![3]);
        assert!(out.join("walk.magnitude.npy").exists());
        assert!(out.join("walk.phase.npy").exists());
    }

    #[test]
    fn test_bad_file_does_not_stop_run() {
        let decoder = MockDecoder::new()
            .with("a_bad", vec![SyntheticCapture::new(0x4242, 20).next_frame().unwrap()])
            .with("b_good", ax210_frames(2));
        let (_root, config) = setup(&decoder);
        let out = config.output_dir.clone();
        let converter = Converter::new(config, SubcarrierPolicy::builtin(), &decoder).unwrap();

        let summary = converter.run(&AtomicBool::new(false)).unwrap();
        assert!(!summary.is_success());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].kind, "unknown-configuration");
        assert_eq!(summary.converted.len(), 1);
        assert!(!out.join("a_bad.csi.npy").exists());
        assert!(out.join("b_good.csi.npy").exists());
    }

    #[test]
    fn test_fail_fast_skips_remaining() {
        let decoder = MockDecoder::new()
            .with("a_bad", vec![SyntheticCapture::new(0x4242, 20).next_frame().unwrap()])
            .with("b_good", ax210_frames(2));
        let (_root, mut config) = setup(&decoder);
        config.fail_fast = true;
        let converter = Converter::new(config, SubcarrierPolicy::builtin(), &decoder).unwrap();

        let summary = converter.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.converted.is_empty());
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_cancelled_run_writes_nothing() {
        let decoder = MockDecoder::new().with("walk", ax210_frames(2));
        let (_root, config) = setup(&decoder);
        let out = config.output_dir.clone();
        let converter = Converter::new(config, SubcarrierPolicy::builtin(), &decoder).unwrap();

        let summary = converter.run(&AtomicBool::new(true)).unwrap();
        assert!(summary.cancelled);
        assert!(!summary.is_success());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_group_by_start_time() {
        let frames = SyntheticCapture::new(DeviceModel::Usrp.code(), 20)
            .with_timing(1_700_000_000_000_000_000, 1_000)
            .take_frames(2)
            .unwrap();
        let decoder = MockDecoder::new().with("walk", frames);
        let (_root, mut config) = setup(&decoder);
        config.group_by_start_time = true;
        config.kinds = vec![OutputKind::Phase];
        let out = config.output_dir.clone();
        let converter = Converter::new(config, SubcarrierPolicy::builtin(), &decoder).unwrap();

        converter.run(&AtomicBool::new(false)).unwrap();
        assert!(out
            .join("[2023-11-14T22;13;20.000000000Z]")
            .join("walk.phase.npy")
            .exists());
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let decoder = MockDecoder::new()
            .with("c", Vec::new())
            .with("a", Vec::new())
            .with("b", Vec::new());
        let (_root, config) = setup(&decoder);
        fs::write(config.input_dir.join("notes.txt"), b"").unwrap();
        let converter = Converter::new(config, SubcarrierPolicy::builtin(), &decoder).unwrap();

        let names: Vec<String> = converter
            .discover()
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mock", "b.mock", "c.mock"]);
    }

    #[test]
    fn test_empty_capture_writes_empty_arrays() {
        let decoder = MockDecoder::new().with("idle", Vec::new());
        let (_root, config) = setup(&decoder);
        let out = config.output_dir.clone();
        let converter = Converter::new(config, SubcarrierPolicy::builtin(), &decoder).unwrap();

        let summary = converter.run(&AtomicBool::new(false)).unwrap();
        assert!(summary.is_success());
        let csi = NpyHeader::read_file(&out.join("idle.csi.npy")).unwrap();
        assert_eq!(csi.shape, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_failed_write_leaves_no_outputs() {
        let decoder = MockDecoder::new().with("walk", ax210_frames(2));
        let (_root, config) = setup(&decoder);
        let out = config.output_dir.clone();
        fs::create_dir_all(out.join("walk.phase.npy")).unwrap();
        let converter = Converter::new(config, SubcarrierPolicy::builtin(), &decoder).unwrap();

        let summary = converter.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].kind, "write-error");

        let mut names: Vec<String> = fs::read_dir(&out)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["walk.phase.npy"]);
        assert!(out.join("walk.phase.npy").is_dir());
    }

    #[test]
    fn test_error_kind_names() {
        let err = ConvertError::Assemble {
            path: PathBuf::from("x.csi"),
            source: AssembleError::Extract {
                frame_index: 4,
                source: ExtractError::Policy(PolicyError::SubcarrierNotFound {
                    index: 0,
                    device_type: 0x2000,
                    bandwidth_mhz: 20,
                }),
            },
        };
        assert_eq!(err.kind(), "subcarrier-not-found");

        let err = ConvertError::Store(StoreError::Write {
            path: PathBuf::from("x.csi.npy"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        });
        assert_eq!(err.kind(), "write-error");
    }
}
