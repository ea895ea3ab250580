//! Decoded capture frames and the decoders that produce them.
//!
//! This module owns the frame record consumed by the rest of the
//! pipeline, the table of known radio hardware, and the seam through
//! which an external decoder supplies frames in arrival order.

mod decoder;
mod device;
mod frame;
mod synthetic;

pub use decoder::{CaptureDecoder, DecodeError, FrameStream, JsonLinesDecoder, JsonLinesFrames};
pub use device::DeviceModel;
pub use frame::{FrameError, FrameMeta, FrameRecord, TensorShape};
pub use synthetic::{interpolated_layout, SyntheticCapture};
