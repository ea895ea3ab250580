//! Per-kind accumulation of extracted values.

use super::array::OutputArray;
use super::AssembleError;
use crate::capture::TensorShape;
use crate::extraction::{ExtractedValue, OutputKind};
use ndarray::{Array3, Array4, ShapeError};
use num_complex::Complex64;

/// Flat row-major buffer of same-shaped tensors.
///
/// A tensor is first staged, then committed or discarded, so a frame can
/// be checked against every kind before any buffer grows.
#[derive(Debug)]
pub(crate) struct TensorStack<T> {
    shape: Option<TensorShape>,
    data: Vec<T>,
    frames: usize,
    pending: Option<Array3<T>>,
}

impl<T: Clone> TensorStack<T> {
    fn new() -> Self {
        Self {
            shape: None,
            data: Vec::new(),
            frames: 0,
            pending: None,
        }
    }

    fn stage(
        &mut self,
        kind: OutputKind,
        frame_index: usize,
        tensor: Array3<T>,
    ) -> Result<(), AssembleError> {
        let found = TensorShape::of(&tensor);
        match self.shape {
            Some(expected) if expected != found => Err(AssembleError::InconsistentShape {
                kind,
                frame_index,
                expected,
                found,
            }),
            _ => {
                self.pending = Some(tensor);
                Ok(())
            }
        }
    }

    fn commit(&mut self) {
        if let Some(tensor) = self.pending.take() {
            self.shape.get_or_insert_with(|| TensorShape::of(&tensor));
            self.data.extend(tensor.iter().cloned());
            self.frames += 1;
        }
    }

    fn finish(self) -> Result<Array4<T>, ShapeError> {
        let (s, t, r) = self.shape.map_or((0, 0, 0), TensorShape::dims);
        Array4::from_shape_vec((self.frames, s, t, r), self.data)
    }
}

/// Capture times in nanoseconds, with the same stage and commit steps.
#[derive(Debug, Default)]
pub(crate) struct TimeStack {
    times: Vec<i64>,
    pending: Option<i64>,
}

/// Accumulator for one output kind.
///
/// A value is staged into the stack of its own kind, so a committed value
/// always lands in a buffer of the matching element type.
#[derive(Debug)]
pub(crate) enum KindStack {
    Complex(TensorStack<Complex64>),
    Real(TensorStack<f64>),
    Timestamp(TimeStack),
}

impl KindStack {
    pub(crate) fn for_kind(kind: OutputKind) -> Self {
        match kind {
            OutputKind::Csi => KindStack::Complex(TensorStack::new()),
            OutputKind::Magnitude | OutputKind::Phase => KindStack::Real(TensorStack::new()),
            OutputKind::Timestamp => KindStack::Timestamp(TimeStack::default()),
        }
    }

    /// Holds `value` for the next [`KindStack::commit`] if it fits the stack.
    ///
    /// A staged value replaces any earlier uncommitted one.
    pub(crate) fn stage(
        &mut self,
        kind: OutputKind,
        frame_index: usize,
        value: ExtractedValue,
    ) -> Result<(), AssembleError> {
        match (self, value) {
            (KindStack::Complex(stack), ExtractedValue::Complex(tensor)) => {
                stack.stage(kind, frame_index, tensor)
            }
            (KindStack::Real(stack), ExtractedValue::Real(tensor)) => {
                stack.stage(kind, frame_index, tensor)
            }
            (KindStack::Timestamp(stack), ExtractedValue::Instant(instant)) => {
                let ns = instant
                    .timestamp_nanos_opt()
                    .ok_or(AssembleError::UnexpectedValue { kind, frame_index })?;
                stack.pending = Some(ns);
                Ok(())
            }
            _ => Err(AssembleError::UnexpectedValue { kind, frame_index }),
        }
    }

    /// Appends the staged value, if any.
    pub(crate) fn commit(&mut self) {
        match self {
            KindStack::Complex(stack) => stack.commit(),
            KindStack::Real(stack) => stack.commit(),
            KindStack::Timestamp(stack) => stack.times.extend(stack.pending.take()),
        }
    }

    /// Drops the staged value, if any.
    pub(crate) fn discard(&mut self) {
        match self {
            KindStack::Complex(stack) => stack.pending = None,
            KindStack::Real(stack) => stack.pending = None,
            KindStack::Timestamp(stack) => stack.pending = None,
        }
    }

    pub(crate) fn finish(self) -> Result<OutputArray, ShapeError> {
        Ok(match self {
            KindStack::Complex(stack) => OutputArray::Complex(stack.finish()?),
            KindStack::Real(stack) => OutputArray::Real(stack.finish()?),
            KindStack::Timestamp(stack) => OutputArray::Timestamp(stack.times.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    #[test]
    fn test_empty_stack_has_zero_frames() {
        let array = KindStack::for_kind(OutputKind::Magnitude).finish().unwrap();
        assert_eq!(array.shape(), &[0, 0, 0, 0]);

        let array = KindStack::for_kind(OutputKind::Timestamp).finish().unwrap();
        assert_eq!(array.shape(), &[0]);
    }

    fn push(stack: &mut KindStack, kind: OutputKind, frame_index: usize, value: ExtractedValue) {
        stack.stage(kind, frame_index, value).unwrap();
        stack.commit();
    }

    #[test]
    fn test_rejects_mismatched_shape() {
        let mut stack = KindStack::for_kind(OutputKind::Phase);
        push(&mut stack, OutputKind::Phase, 0, ExtractedValue::Real(Array3::zeros((4, 1, 2))));

        let second = ExtractedValue::Real(Array3::zeros((4, 2, 2)));
        let err = stack.stage(OutputKind::Phase, 1, second).unwrap_err();
        assert!(matches!(
            err,
            AssembleError::InconsistentShape {
                frame_index: 1,
                expected: TensorShape { tx: 1, .. },
                found: TensorShape { tx: 2, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_wrong_value_variant() {
        let mut stack = KindStack::for_kind(OutputKind::Csi);
        let value = ExtractedValue::Instant(DateTime::<Utc>::from_timestamp_nanos(0));
        assert!(matches!(
            stack.stage(OutputKind::Csi, 3, value),
            Err(AssembleError::UnexpectedValue { frame_index: 3, .. })
        ));

        stack.commit();
        assert_eq!(stack.finish().unwrap().frame_count(), 0);
    }

    #[test]
    fn test_discarded_value_is_not_committed() {
        let mut stack = KindStack::for_kind(OutputKind::Timestamp);
        let instant = |ns| ExtractedValue::Instant(DateTime::<Utc>::from_timestamp_nanos(ns));
        push(&mut stack, OutputKind::Timestamp, 0, instant(10));
        stack.stage(OutputKind::Timestamp, 1, instant(20)).unwrap();
        stack.discard();
        stack.commit();
        push(&mut stack, OutputKind::Timestamp, 1, instant(30));

        let array = stack.finish().unwrap();
        assert_eq!(array, OutputArray::Timestamp(vec![10, 30].into()));
    }

    #[test]
    fn test_stacks_in_commit_order() {
        let mut stack = KindStack::for_kind(OutputKind::Magnitude);
        for n in 0..3 {
            let value = ExtractedValue::Real(Array3::from_elem((2, 1, 1), n as f64));
            push(&mut stack, OutputKind::Magnitude, n, value);
        }
        let array = stack.finish().unwrap();
        let real = array.as_real().unwrap();

        assert_eq!(real.shape(), &[3, 2, 1, 1]);
        assert_eq!(real[[2, 1, 0, 0]], 2.0);
        assert_eq!(real[[0, 0, 0, 0]], 0.0);
    }
}
