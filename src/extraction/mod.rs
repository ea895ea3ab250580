//! Per-frame extraction of output values.
//!
//! This module turns one decoded frame into the value stored for a
//! requested output kind. Tensor kinds are filtered down to the
//! measured subcarriers unless the caller asks for the interpolated
//! spectrum; timestamps become UTC instants.

mod kind;
mod value;

pub use kind::OutputKind;
pub use value::ExtractedValue;

use crate::capture::FrameRecord;
use crate::policy::{select, PolicyError, SelectionCache, SubcarrierPolicy, SubcarrierSelection};
use chrono::{DateTime, Utc};
use ndarray::Axis;

/// Extraction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// The policy table rejected the frame.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The kind name is not one of the supported outputs.
    #[error("unsupported output kind {0:?} (expected csi, magnitude, phase or timestamp)")]
    UnsupportedKind(String),
}

/// Extracts one output value from a frame.
///
/// With `interpolate` set, tensor kinds are returned unmodified. Otherwise
/// the policy table decides which subcarrier rows are kept. The frame is
/// never modified.
pub fn extract(
    frame: &FrameRecord,
    kind: OutputKind,
    interpolate: bool,
    policy: &SubcarrierPolicy,
) -> Result<ExtractedValue, ExtractError> {
    if kind == OutputKind::Timestamp {
        return Ok(instant(frame));
    }
    if interpolate {
        return Ok(project(frame, kind, None));
    }
    let selection = select(policy, frame)?;
    Ok(project(frame, kind, Some(&selection)))
}

/// Extractor that caches subcarrier selections across frames.
///
/// Produces the same values as [`extract`], resolving each distinct
/// subcarrier layout only once.
#[derive(Debug)]
pub struct Extractor<'p> {
    policy: &'p SubcarrierPolicy,
    cache: SelectionCache,
}

impl<'p> Extractor<'p> {
    /// Creates an extractor reading from `policy`.
    pub fn new(policy: &'p SubcarrierPolicy) -> Self {
        Self {
            policy,
            cache: SelectionCache::new(),
        }
    }

    /// Extracts one output value from a frame.
    pub fn extract(
        &mut self,
        frame: &FrameRecord,
        kind: OutputKind,
        interpolate: bool,
    ) -> Result<ExtractedValue, ExtractError> {
        if kind == OutputKind::Timestamp {
            return Ok(instant(frame));
        }
        if interpolate {
            return Ok(project(frame, kind, None));
        }
        let selection = self.cache.get(self.policy, frame)?;
        Ok(project(frame, kind, Some(selection.as_ref())))
    }

    /// Returns selection cache (hits, misses).
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.stats()
    }
}

fn instant(frame: &FrameRecord) -> ExtractedValue {
    ExtractedValue::Instant(DateTime::<Utc>::from_timestamp_nanos(frame.capture_time_ns()))
}

fn project(
    frame: &FrameRecord,
    kind: OutputKind,
    selection: Option<&SubcarrierSelection>,
) -> ExtractedValue {
    let rows = selection.map(SubcarrierSelection::positions);
    match kind {
        OutputKind::Csi => ExtractedValue::Complex(match rows {
            Some(rows) => frame.csi().select(Axis(0), rows),
            None => frame.csi().clone(),
        }),
        OutputKind::Magnitude => ExtractedValue::Real(match rows {
            Some(rows) => frame.magnitude().select(Axis(0), rows),
            None => frame.magnitude().clone(),
        }),
        OutputKind::Phase => ExtractedValue::Real(match rows {
            Some(rows) => frame.phase().select(Axis(0), rows),
            None => frame.phase().clone(),
        }),
        OutputKind::Timestamp => instant(frame),
    }
}
