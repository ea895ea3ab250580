//! Batch assembly of per-frame values into dense arrays.
//!
//! The assembler walks a capture's frames once, in arrival order, and
//! extracts every requested kind from each frame before moving on, so
//! position `i` of every output array refers to the same frame.
//!
//! # Failure policy
//!
//! Any extraction or shape fault aborts the batch. A frame is extracted
//! and checked for every kind before any kind's buffer is appended, so a
//! rejected frame leaves the assembler exactly as it was.

mod array;
mod stack;

pub use array::OutputArray;

use crate::capture::{FrameRecord, TensorShape};
use crate::extraction::{ExtractError, Extractor, OutputKind};
use crate::policy::SubcarrierPolicy;
use chrono::{DateTime, Utc};
use ndarray::ShapeError;
use stack::KindStack;
use std::borrow::Borrow;
use std::collections::BTreeMap;

/// Batch assembly errors.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    /// The assembler was created without any output kind.
    #[error("no output kinds requested")]
    NoKinds,

    /// A frame could not be extracted.
    #[error("frame {frame_index}: {source}")]
    Extract {
        /// Zero-based position of the frame in the sequence.
        frame_index: usize,
        /// Extraction failure.
        #[source]
        source: ExtractError,
    },

    /// A frame's tensor shape differs from the frames before it.
    #[error("frame {frame_index}: {kind} shape {found} differs from {expected} of earlier frames")]
    InconsistentShape {
        /// Kind whose shape changed.
        kind: OutputKind,
        /// Zero-based position of the frame in the sequence.
        frame_index: usize,
        /// Shape of the earlier frames.
        expected: TensorShape,
        /// Shape of this frame.
        found: TensorShape,
    },

    /// The extracted value does not belong to the requested kind.
    #[error("frame {frame_index}: extractor produced an unexpected {kind} value")]
    UnexpectedValue {
        /// Kind that was requested.
        kind: OutputKind,
        /// Zero-based position of the frame in the sequence.
        frame_index: usize,
    },

    /// The accumulated buffer could not be shaped into the output array.
    #[error("failed to stack {kind} array: {source}")]
    Stack {
        /// Kind being stacked.
        kind: OutputKind,
        /// Shape failure.
        #[source]
        source: ShapeError,
    },
}

/// The arrays assembled from one frame sequence.
#[derive(Debug, Clone)]
pub struct AssembledBatch {
    frames: usize,
    arrays: BTreeMap<OutputKind, OutputArray>,
    first_capture_ns: Option<i64>,
}

impl AssembledBatch {
    /// Returns the number of frames in every array.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Returns the array for a kind, if it was requested.
    pub fn get(&self, kind: OutputKind) -> Option<&OutputArray> {
        self.arrays.get(&kind)
    }

    /// Iterates over (kind, array) pairs in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (OutputKind, &OutputArray)> {
        self.arrays.iter().map(|(&kind, array)| (kind, array))
    }

    /// Returns the capture time of the first frame.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.first_capture_ns.map(DateTime::<Utc>::from_timestamp_nanos)
    }
}

/// Incremental assembler for one frame sequence.
#[derive(Debug)]
pub struct BatchAssembler<'p> {
    extractor: Extractor<'p>,
    interpolate: bool,
    stacks: BTreeMap<OutputKind, KindStack>,
    frames: usize,
    first_capture_ns: Option<i64>,
}

impl<'p> BatchAssembler<'p> {
    /// Creates an assembler for the given kinds.
    ///
    /// Repeated kinds are collapsed. `interpolate` keeps the filler
    /// subcarriers in tensor outputs.
    pub fn new(
        policy: &'p SubcarrierPolicy,
        kinds: impl IntoIterator<Item = OutputKind>,
        interpolate: bool,
    ) -> Result<Self, AssembleError> {
        let stacks: BTreeMap<_, _> = kinds
            .into_iter()
            .map(|kind| (kind, KindStack::for_kind(kind)))
            .collect();
        if stacks.is_empty() {
            return Err(AssembleError::NoKinds);
        }

        Ok(Self {
            extractor: Extractor::new(policy),
            interpolate,
            stacks,
            frames: 0,
            first_capture_ns: None,
        })
    }

    /// Returns the number of frames accepted so far.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Extracts every requested kind from the next frame and appends it.
    pub fn push(&mut self, frame: &FrameRecord) -> Result<(), AssembleError> {
        let frame_index = self.frames;
        if let Err(e) = self.stage(frame, frame_index) {
            for stack in self.stacks.values_mut() {
                stack.discard();
            }
            return Err(e);
        }

        for stack in self.stacks.values_mut() {
            stack.commit();
        }
        self.frames += 1;
        self.first_capture_ns.get_or_insert(frame.capture_time_ns());

        tracing::trace!(frame_index, "Assembled frame");
        Ok(())
    }

    fn stage(&mut self, frame: &FrameRecord, frame_index: usize) -> Result<(), AssembleError> {
        for (&kind, stack) in &mut self.stacks {
            let value = self
                .extractor
                .extract(frame, kind, self.interpolate)
                .map_err(|source| AssembleError::Extract {
                    frame_index,
                    source,
                })?;
            stack.stage(kind, frame_index, value)?;
        }
        Ok(())
    }

    /// Stacks every kind into its output array.
    pub fn finish(self) -> Result<AssembledBatch, AssembleError> {
        let (hits, misses) = self.extractor.cache_stats();
        tracing::debug!(
            frames = self.frames,
            kinds = self.stacks.len(),
            layout_hits = hits,
            layout_misses = misses,
            "Stacking batch"
        );

        let arrays: BTreeMap<_, _> = self
            .stacks
            .into_iter()
            .map(|(kind, stack)| {
                stack
                    .finish()
                    .map(|array| (kind, array))
                    .map_err(|source| AssembleError::Stack { kind, source })
            })
            .collect::<Result<_, _>>()?;

        Ok(AssembledBatch {
            frames: self.frames,
            arrays,
            first_capture_ns: self.first_capture_ns,
        })
    }
}

/// Assembles a whole frame sequence in one call.
///
/// Returns one array per requested kind, each with a leading axis equal
/// to the number of frames. An empty sequence yields empty arrays.
pub fn assemble<I>(
    frames: I,
    kinds: &[OutputKind],
    interpolate: bool,
    policy: &SubcarrierPolicy,
) -> Result<AssembledBatch, AssembleError>
where
    I: IntoIterator,
    I::Item: Borrow<FrameRecord>,
{
    let mut assembler = BatchAssembler::new(policy, kinds.iter().copied(), interpolate)?;
    for frame in frames {
        let frame: &FrameRecord = frame.borrow();
        assembler.push(frame)?;
    }
    assembler.finish()
}
