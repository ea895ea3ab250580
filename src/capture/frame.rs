//! Decoded CSI frame with its capture metadata.

use ndarray::{Array3, ShapeError};
use num_complex::Complex64;
use std::fmt;

/// Shape of a per-frame tensor: subcarriers x transmit x receive antennas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorShape {
    /// Number of subcarriers (tones).
    pub subcarriers: usize,
    /// Number of transmit antennas (spatial streams).
    pub tx: usize,
    /// Number of receive antennas.
    pub rx: usize,
}

impl TensorShape {
    /// Creates a shape from its three dimensions.
    pub const fn new(subcarriers: usize, tx: usize, rx: usize) -> Self {
        Self {
            subcarriers,
            tx,
            rx,
        }
    }

    /// Returns the shape as an ndarray dimension tuple.
    #[inline]
    pub const fn dims(self) -> (usize, usize, usize) {
        (self.subcarriers, self.tx, self.rx)
    }

    /// Returns the number of elements in a tensor of this shape, or `None`
    /// if the count overflows `usize`.
    #[inline]
    pub const fn checked_len(self) -> Option<usize> {
        match self.subcarriers.checked_mul(self.tx) {
            Some(n) => n.checked_mul(self.rx),
            None => None,
        }
    }

    /// Returns true if any dimension is zero.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.subcarriers == 0 || self.tx == 0 || self.rx == 0
    }

    /// Returns the shape of a tensor.
    pub fn of<T>(tensor: &Array3<T>) -> Self {
        let (s, t, r) = tensor.dim();
        Self::new(s, t, r)
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.subcarriers, self.tx, self.rx)
    }
}

/// Capture metadata shared by every tensor of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    /// Raw device code reported by the capture toolchain.
    pub device_type: u16,
    /// Channel bandwidth in MHz.
    pub channel_bandwidth: u16,
    /// Capture time, nanoseconds since the Unix epoch.
    pub capture_time_ns: i64,
}

/// Frame construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A tensor dimension is zero.
    #[error("tensor shape {0} has a zero dimension")]
    EmptyDimension(TensorShape),
    /// The element count of the shape does not fit in memory.
    #[error("tensor shape {0} is too large")]
    TooLarge(TensorShape),
    /// The index list does not name every subcarrier row.
    #[error("subcarrier index list has {found} entries, expected {expected}")]
    IndexCountMismatch {
        /// Subcarrier rows in the tensor.
        expected: usize,
        /// Entries in the index list.
        found: usize,
    },
    /// Magnitude or phase disagrees with the CSI shape.
    #[error("{tensor} tensor has shape {found}, expected {expected}")]
    ShapeMismatch {
        /// Offending tensor.
        tensor: &'static str,
        /// Shape of the CSI tensor.
        expected: TensorShape,
        /// Shape of the offending tensor.
        found: TensorShape,
    },
    /// A flat buffer does not fill its declared shape.
    #[error("{tensor} data has {found} values, shape {shape} needs {expected}")]
    ElementCount {
        /// Offending tensor.
        tensor: &'static str,
        /// Declared shape.
        shape: TensorShape,
        /// Values the shape needs.
        expected: usize,
        /// Values supplied.
        found: usize,
    },
}

/// One decoded capture event.
///
/// The CSI, magnitude and phase tensors all have shape
/// `(num_subcarriers, num_tx, num_rx)`, and the subcarrier index list
/// names every row of the subcarrier axis, interpolated tones included.
#[derive(Clone, PartialEq)]
pub struct FrameRecord {
    meta: FrameMeta,
    subcarrier_indices: Vec<i16>,
    csi: Array3<Complex64>,
    magnitude: Array3<f64>,
    phase: Array3<f64>,
}

impl FrameRecord {
    /// Creates a frame from its tensors, checking the shape invariants.
    pub fn new(
        meta: FrameMeta,
        subcarrier_indices: Vec<i16>,
        csi: Array3<Complex64>,
        magnitude: Array3<f64>,
        phase: Array3<f64>,
    ) -> Result<Self, FrameError> {
        let shape = TensorShape::of(&csi);
        if shape.is_empty() {
            return Err(FrameError::EmptyDimension(shape));
        }
        if subcarrier_indices.len() != shape.subcarriers {
            return Err(FrameError::IndexCountMismatch {
                expected: shape.subcarriers,
                found: subcarrier_indices.len(),
            });
        }
        for (tensor, found) in [
            ("magnitude", TensorShape::of(&magnitude)),
            ("phase", TensorShape::of(&phase)),
        ] {
            if found != shape {
                return Err(FrameError::ShapeMismatch {
                    tensor,
                    expected: shape,
                    found,
                });
            }
        }

        Ok(Self {
            meta,
            subcarrier_indices,
            csi,
            magnitude,
            phase,
        })
    }

    /// Creates a frame from complex CSI alone, deriving magnitude and phase.
    pub fn from_csi(
        meta: FrameMeta,
        subcarrier_indices: Vec<i16>,
        csi: Array3<Complex64>,
    ) -> Result<Self, FrameError> {
        let magnitude = csi.mapv(|h| h.norm());
        let phase = csi.mapv(|h| h.arg());
        Self::new(meta, subcarrier_indices, csi, magnitude, phase)
    }

    /// Creates a frame from flat row-major buffers as emitted by the decoder.
    ///
    /// Magnitude and phase are derived from the CSI when not supplied.
    pub fn from_flat(
        meta: FrameMeta,
        shape: TensorShape,
        subcarrier_indices: Vec<i16>,
        csi: Vec<Complex64>,
        magnitude: Option<Vec<f64>>,
        phase: Option<Vec<f64>>,
    ) -> Result<Self, FrameError> {
        if shape.is_empty() {
            return Err(FrameError::EmptyDimension(shape));
        }
        let expected = shape.checked_len().ok_or(FrameError::TooLarge(shape))?;
        let csi = reshape("csi", shape, expected, csi)?;
        let magnitude = match magnitude {
            Some(values) => reshape("magnitude", shape, expected, values)?,
            None => csi.mapv(|h| h.norm()),
        };
        let phase = match phase {
            Some(values) => reshape("phase", shape, expected, values)?,
            None => csi.mapv(|h| h.arg()),
        };
        Self::new(meta, subcarrier_indices, csi, magnitude, phase)
    }

    /// Returns the raw device code.
    #[inline]
    pub fn device_type(&self) -> u16 {
        self.meta.device_type
    }

    /// Returns the channel bandwidth in MHz.
    #[inline]
    pub fn channel_bandwidth(&self) -> u16 {
        self.meta.channel_bandwidth
    }

    /// Returns the capture time in nanoseconds since the Unix epoch.
    #[inline]
    pub fn capture_time_ns(&self) -> i64 {
        self.meta.capture_time_ns
    }

    /// Returns the signed subcarrier index of every tensor row.
    #[inline]
    pub fn subcarrier_indices(&self) -> &[i16] {
        &self.subcarrier_indices
    }

    /// Returns the tensor shape.
    #[inline]
    pub fn shape(&self) -> TensorShape {
        TensorShape::of(&self.csi)
    }

    /// Returns the number of subcarrier rows, filler included.
    #[inline]
    pub fn num_subcarriers(&self) -> usize {
        self.shape().subcarriers
    }

    /// Returns the number of transmit antennas.
    #[inline]
    pub fn num_tx(&self) -> usize {
        self.shape().tx
    }

    /// Returns the number of receive antennas.
    #[inline]
    pub fn num_rx(&self) -> usize {
        self.shape().rx
    }

    /// Returns the complex channel estimate.
    #[inline]
    pub fn csi(&self) -> &Array3<Complex64> {
        &self.csi
    }

    /// Returns the magnitude tensor.
    #[inline]
    pub fn magnitude(&self) -> &Array3<f64> {
        &self.magnitude
    }

    /// Returns the phase tensor (radians).
    #[inline]
    pub fn phase(&self) -> &Array3<f64> {
        &self.phase
    }
}

fn reshape<T>(
    tensor: &'static str,
    shape: TensorShape,
    expected: usize,
    values: Vec<T>,
) -> Result<Array3<T>, FrameError> {
    let found = values.len();
    Array3::from_shape_vec(shape.dims(), values).map_err(|_: ShapeError| {
        FrameError::ElementCount {
            tensor,
            shape,
            expected,
            found,
        }
    })
}

impl fmt::Debug for FrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRecord")
            .field("device_type", &format_args!("{:#06x}", self.meta.device_type))
            .field("channel_bandwidth", &self.meta.channel_bandwidth)
            .field("capture_time_ns", &self.meta.capture_time_ns)
            .field("shape", &self.shape())
            .finish_non_exhaustive()
    }
}
