//! CSI to NumPy Conversion Library
//!
//! Turns decoded PicoScenes CSI captures into dense arrays. Each frame's
//! channel estimate arrives pre-interpolated across the full subcarrier
//! range; this crate drops the interpolated filler tones, stacks the
//! measured ones across all frames of a capture, and writes one `.npy`
//! file per output kind.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → extraction → assembly → store
//!               ↑
//!            policy (interpolated subcarriers per device/bandwidth)
//! ```
//!
//! `convert` drives this per file over a directory.
//!
//! # Design Principles
//!
//! - **Frame order is preserved**: position `i` of every output array is frame `i`
//! - **No silent degradation**: unknown configurations and shape changes abort the file
//! - **No partial outputs**: arrays are written atomically
//!
//! # Example
//!
//! ```no_run
//! use csi_npy::{
//!     assembly::assemble,
//!     capture::{CaptureDecoder, JsonLinesDecoder},
//!     extraction::OutputKind,
//!     policy::SubcarrierPolicy,
//!     store::ArrayWriter,
//! };
//! use std::path::Path;
//!
//! let decoder = JsonLinesDecoder::new();
//! let frames = decoder
//!     .open(Path::new("walk.jsonl"))
//!     .unwrap()
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//!
//! let policy = SubcarrierPolicy::builtin();
//! let batch = assemble(&frames, &[OutputKind::Csi, OutputKind::Timestamp], false, &policy)
//!     .unwrap();
//!
//! let writer = ArrayWriter::new("out");
//! writer.write_set("walk", batch.iter()).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod assembly;
pub mod capture;
pub mod convert;
pub mod extraction;
pub mod metrics;
pub mod policy;
pub mod store;

// Re-export commonly used types at crate root
pub use assembly::{assemble, AssembleError, AssembledBatch, BatchAssembler, OutputArray};
pub use capture::{CaptureDecoder, DeviceModel, FrameRecord, JsonLinesDecoder, TensorShape};
pub use convert::{ConvertConfig, ConvertError, Converter};
pub use extraction::{extract, ExtractError, ExtractedValue, Extractor, OutputKind};
pub use policy::{PolicyError, SubcarrierPolicy};
pub use store::{ArrayWriter, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
