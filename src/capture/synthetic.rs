//! Deterministic synthetic captures for testing and benchmarking.
//!
//! Frames are shaped like upstream-interpolated captures: the index
//! list spans the whole band including the filler tones at the center.
//! Values are a smooth function of (frame, subcarrier, tx, rx) so tests
//! can tell rows apart after filtering.

use super::frame::{FrameError, FrameMeta, FrameRecord};
use ndarray::Array3;
use num_complex::Complex64;

/// Returns the interpolated index layout for a bandwidth.
///
/// The layout is the contiguous range `-edge..=edge`, with `edge` 28, 58,
/// 122 and 250 for 20, 40, 80 and 160 MHz. Other bandwidths get the
/// 20 MHz layout.
pub fn interpolated_layout(bandwidth_mhz: u16) -> Vec<i16> {
    let edge: i16 = match bandwidth_mhz {
        40 => 58,
        80 => 122,
        160 => 250,
        _ => 28,
    };
    (-edge..=edge).collect()
}

/// Generator of synthetic frames for one device configuration.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    device_type: u16,
    bandwidth_mhz: u16,
    subcarriers: Vec<i16>,
    tx: usize,
    rx: usize,
    start_ns: i64,
    interval_ns: i64,
    sequence: u64,
}

impl SyntheticCapture {
    /// Creates a 1x2 capture with the default layout for the bandwidth.
    pub fn new(device_type: u16, bandwidth_mhz: u16) -> Self {
        Self {
            device_type,
            bandwidth_mhz,
            subcarriers: interpolated_layout(bandwidth_mhz),
            tx: 1,
            rx: 2,
            start_ns: 1_700_000_000_000_000_000,
            interval_ns: 1_000_000,
            sequence: 0,
        }
    }

    /// Overrides the subcarrier index list.
    pub fn with_subcarriers(mut self, subcarriers: Vec<i16>) -> Self {
        self.subcarriers = subcarriers;
        self
    }

    /// Overrides the antenna layout.
    pub fn with_antennas(mut self, tx: usize, rx: usize) -> Self {
        self.tx = tx;
        self.rx = rx;
        self
    }

    /// Overrides the first capture time and the spacing between frames.
    pub fn with_timing(mut self, start_ns: i64, interval_ns: i64) -> Self {
        self.start_ns = start_ns;
        self.interval_ns = interval_ns;
        self
    }

    /// Returns the number of frames generated so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Generates the next frame.
    pub fn next_frame(&mut self) -> Result<FrameRecord, FrameError> {
        let n = self.sequence;
        let meta = FrameMeta {
            device_type: self.device_type,
            channel_bandwidth: self.bandwidth_mhz,
            capture_time_ns: self.start_ns + self.interval_ns * n as i64,
        };
        let indices = &self.subcarriers;
        let csi = Array3::from_shape_fn((indices.len(), self.tx, self.rx), |(s, t, r)| {
            let amplitude = 1.0 + (t * self.rx + r) as f64;
            let angle = 0.01 * f64::from(indices[s]) + 0.1 * n as f64;
            Complex64::from_polar(amplitude, angle)
        });

        self.sequence += 1;
        FrameRecord::from_csi(meta, indices.clone(), csi)
    }

    /// Generates `count` consecutive frames.
    pub fn take_frames(&mut self, count: usize) -> Result<Vec<FrameRecord>, FrameError> {
        (0..count).map(|_| self.next_frame()).collect()
    }
}
