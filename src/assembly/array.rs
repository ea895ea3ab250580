//! Stacked per-kind output arrays.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array4};
use num_complex::Complex64;

/// One dense array covering every frame of a batch.
///
/// The leading axis is the frame axis. Tensor arrays carry
/// `(subcarriers, tx, rx)` trailing axes; timestamps are one value per
/// frame, in nanoseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputArray {
    /// Complex CSI, `(frames, subcarriers, tx, rx)`.
    Complex(Array4<Complex64>),
    /// Magnitude or phase, `(frames, subcarriers, tx, rx)`.
    Real(Array4<f64>),
    /// Capture times in nanoseconds, `(frames,)`.
    Timestamp(Array1<i64>),
}

impl OutputArray {
    /// Returns the full array shape.
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputArray::Complex(array) => array.shape(),
            OutputArray::Real(array) => array.shape(),
            OutputArray::Timestamp(array) => array.shape(),
        }
    }

    /// Returns the length of the frame axis.
    pub fn frame_count(&self) -> usize {
        self.shape()[0]
    }

    /// Returns the number of elements.
    pub(crate) fn len(&self) -> usize {
        self.shape().iter().product()
    }

    /// Returns the complex array, if this is one.
    pub fn as_complex(&self) -> Option<&Array4<Complex64>> {
        match self {
            OutputArray::Complex(array) => Some(array),
            _ => None,
        }
    }

    /// Returns the real array, if this is one.
    pub fn as_real(&self) -> Option<&Array4<f64>> {
        match self {
            OutputArray::Real(array) => Some(array),
            _ => None,
        }
    }

    /// Returns the timestamps as UTC instants, if this is a timestamp array.
    pub fn instants(&self) -> Option<Vec<DateTime<Utc>>> {
        match self {
            OutputArray::Timestamp(array) => {
                Some(array.iter().map(|&ns| DateTime::<Utc>::from_timestamp_nanos(ns)).collect())
            }
            _ => None,
        }
    }
}
