//! Per-frame extraction results.

use crate::capture::TensorShape;
use chrono::{DateTime, Utc};
use ndarray::Array3;
use num_complex::Complex64;

/// The value extracted from one frame for one output kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedValue {
    /// Complex tensor (CSI).
    Complex(Array3<Complex64>),
    /// Real tensor (magnitude or phase).
    Real(Array3<f64>),
    /// Capture instant.
    Instant(DateTime<Utc>),
}

impl ExtractedValue {
    /// Returns the tensor shape, or `None` for scalar values.
    pub fn shape(&self) -> Option<TensorShape> {
        match self {
            ExtractedValue::Complex(tensor) => Some(TensorShape::of(tensor)),
            ExtractedValue::Real(tensor) => Some(TensorShape::of(tensor)),
            ExtractedValue::Instant(_) => None,
        }
    }

    /// Returns the complex tensor, if this is one.
    pub fn as_complex(&self) -> Option<&Array3<Complex64>> {
        match self {
            ExtractedValue::Complex(tensor) => Some(tensor),
            _ => None,
        }
    }

    /// Returns the real tensor, if this is one.
    pub fn as_real(&self) -> Option<&Array3<f64>> {
        match self {
            ExtractedValue::Real(tensor) => Some(tensor),
            _ => None,
        }
    }

    /// Returns the instant, if this is one.
    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            ExtractedValue::Instant(instant) => Some(*instant),
            _ => None,
        }
    }
}
