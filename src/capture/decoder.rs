//! Decoder abstraction for capture files.
//!
//! Parsing the vendor's binary capture format is the job of an external
//! toolbox. This module defines the seam the converter reads frames
//! through, plus a decoder for the toolbox's line-delimited JSON dump.

use super::frame::{FrameError, FrameMeta, FrameRecord, TensorShape};
use num_complex::Complex64;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while decoding a capture file.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The capture could not be opened or read.
    #[error("failed to read capture: {0}")]
    Io(#[from] io::Error),
    /// A line is not a valid frame record.
    #[error("line {line}: malformed frame record: {source}")]
    Json {
        /// 1-based line number in the capture.
        line: usize,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// A record's tensors do not match its declared layout.
    #[error("line {line}: {source}")]
    Frame {
        /// 1-based line number in the capture.
        line: usize,
        /// Shape failure.
        #[source]
        source: FrameError,
    },
}

/// Ordered stream of decoded frames from one capture file.
pub type FrameStream = Box<dyn Iterator<Item = Result<FrameRecord, DecodeError>>>;

/// Trait for capture decoders.
///
/// A decoder turns one capture file into its frames in file order.
/// The converter discovers input files by the decoder's extension.
pub trait CaptureDecoder {
    /// File extension (without the dot) this decoder consumes.
    fn extension(&self) -> &str;

    /// Opens a capture file and returns its frames in arrival order.
    fn open(&self, path: &Path) -> Result<FrameStream, DecodeError>;
}

/// Decoder for line-delimited JSON frame dumps.
///
/// Each non-blank line holds one decoded frame in the toolbox layout:
///
/// ```text
/// {"CSI": {"DeviceType": 8192, "CBW": 40, "numTones": 114, "numTx": 1,
///          "numRx": 2, "SubcarrierIndex": [...], "CSI": [[re, im], ...],
///          "Mag": [...], "Phase": [...]},
///  "RxSBasic": {"systemns": 1700000000000000000}}
/// ```
///
/// `Mag` and `Phase` are optional and derived from `CSI` when absent.
#[derive(Debug, Clone)]
pub struct JsonLinesDecoder {
    extension: String,
}

impl JsonLinesDecoder {
    /// Default extension for frame dumps.
    pub const DEFAULT_EXTENSION: &'static str = "jsonl";

    /// Creates a decoder matching [`Self::DEFAULT_EXTENSION`].
    pub fn new() -> Self {
        Self::with_extension(Self::DEFAULT_EXTENSION)
    }

    /// Creates a decoder that discovers files with a custom extension.
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }
}

impl Default for JsonLinesDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDecoder for JsonLinesDecoder {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn open(&self, path: &Path) -> Result<FrameStream, DecodeError> {
        let file = File::open(path)?;
        tracing::debug!(path = %path.display(), "Opened frame dump");
        Ok(Box::new(JsonLinesFrames::new(BufReader::new(file))))
    }
}

/// Iterator over the frames of a JSON-lines dump.
#[derive(Debug)]
pub struct JsonLinesFrames<R> {
    lines: io::Lines<R>,
    line: usize,
}

impl<R: BufRead> JsonLinesFrames<R> {
    /// Wraps a reader positioned at the first line of a dump.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for JsonLinesFrames<R> {
    type Item = Result<FrameRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(DecodeError::Io(e))),
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            return Some(parse_record(&text, self.line));
        }
    }
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "CSI")]
    csi: RawCsi,
    #[serde(rename = "RxSBasic")]
    rx_basic: RawRxBasic,
}

#[derive(Deserialize)]
struct RawCsi {
    #[serde(rename = "DeviceType")]
    device_type: u16,
    #[serde(rename = "CBW")]
    cbw: u16,
    #[serde(rename = "numTones")]
    num_tones: usize,
    #[serde(rename = "numTx")]
    num_tx: usize,
    #[serde(rename = "numRx")]
    num_rx: usize,
    #[serde(rename = "SubcarrierIndex")]
    subcarrier_index: Vec<i16>,
    #[serde(rename = "CSI")]
    csi: Vec<Complex64>,
    #[serde(rename = "Mag", default)]
    mag: Option<Vec<f64>>,
    #[serde(rename = "Phase", default)]
    phase: Option<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawRxBasic {
    systemns: i64,
}

fn parse_record(text: &str, line: usize) -> Result<FrameRecord, DecodeError> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|source| DecodeError::Json { line, source })?;
    let meta = FrameMeta {
        device_type: raw.csi.device_type,
        channel_bandwidth: raw.csi.cbw,
        capture_time_ns: raw.rx_basic.systemns,
    };
    let shape = TensorShape::new(raw.csi.num_tones, raw.csi.num_tx, raw.csi.num_rx);

    FrameRecord::from_flat(
        meta,
        shape,
        raw.csi.subcarrier_index,
        raw.csi.csi,
        raw.csi.mag,
        raw.csi.phase,
    )
    .map_err(|source| DecodeError::Frame { line, source })
}
