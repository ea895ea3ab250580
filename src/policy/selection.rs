//! Resolution of a frame's subcarrier layout into kept tensor rows.

use super::table::{PolicyError, SubcarrierPolicy};
use crate::capture::FrameRecord;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The measured subcarriers of one frame layout and their row positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubcarrierSelection {
    indices: Vec<i16>,
    positions: Vec<usize>,
}

impl SubcarrierSelection {
    /// Resolves which rows of `layout` survive the removal of `interpolated`.
    ///
    /// Kept subcarriers stay in layout order; a repeated index keeps its
    /// first row only. Every interpolated index must occur in the layout.
    pub fn resolve(layout: &[i16], interpolated: &[i16]) -> Result<Self, i16> {
        if let Some(&missing) = interpolated.iter().find(|&&i| !layout.contains(&i)) {
            return Err(missing);
        }

        let mut seen = HashSet::with_capacity(layout.len());
        let (indices, positions): (Vec<i16>, Vec<usize>) = layout
            .iter()
            .enumerate()
            .filter(|&(_, &index)| !interpolated.contains(&index) && seen.insert(index))
            .map(|(position, &index)| (index, position))
            .unzip();

        Ok(Self { indices, positions })
    }

    /// Returns the kept subcarrier indices, in output order.
    #[inline]
    pub fn indices(&self) -> &[i16] {
        &self.indices
    }

    /// Returns the tensor row of each kept subcarrier.
    #[inline]
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Returns the number of kept subcarriers.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if no subcarrier is kept.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Resolves the selection for a frame against the policy table.
pub fn select(
    policy: &SubcarrierPolicy,
    frame: &FrameRecord,
) -> Result<SubcarrierSelection, PolicyError> {
    let (device_type, bandwidth_mhz) = (frame.device_type(), frame.channel_bandwidth());
    let interpolated = policy.lookup(device_type, bandwidth_mhz)?;
    SubcarrierSelection::resolve(frame.subcarrier_indices(), interpolated).map_err(|index| {
        PolicyError::SubcarrierNotFound {
            index,
            device_type,
            bandwidth_mhz,
        }
    })
}

/// Reuses selections across frames that share a layout.
///
/// Captures repeat the same index list for every frame of a given
/// device and bandwidth, so the selection is resolved once and only the
/// list comparison is paid per frame.
#[derive(Debug, Default)]
pub struct SelectionCache {
    layouts: HashMap<(u16, u16), (Vec<i16>, Arc<SubcarrierSelection>)>,
    hits: u64,
    misses: u64,
}

impl SelectionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the selection for a frame, resolving it on a layout change.
    pub fn get(
        &mut self,
        policy: &SubcarrierPolicy,
        frame: &FrameRecord,
    ) -> Result<Arc<SubcarrierSelection>, PolicyError> {
        let key = (frame.device_type(), frame.channel_bandwidth());
        if let Some((layout, selection)) = self.layouts.get(&key) {
            if layout.as_slice() == frame.subcarrier_indices() {
                self.hits += 1;
                return Ok(Arc::clone(selection));
            }
        }

        let selection = Arc::new(select(policy, frame)?);
        self.misses += 1;
        tracing::debug!(
            device_type = key.0,
            bandwidth = key.1,
            layout = frame.num_subcarriers(),
            kept = selection.len(),
            "Resolved subcarrier selection"
        );
        self.layouts.insert(
            key,
            (frame.subcarrier_indices().to_vec(), Arc::clone(&selection)),
        );
        Ok(selection)
    }

    /// Returns (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticCapture;

    #[test]
    fn test_resolve_drops_center_tones() {
        let layout: Vec<i16> = (-3..=3).collect();
        let selection = SubcarrierSelection::resolve(&layout, &[-1, 0, 1]).unwrap();

        assert_eq!(selection.indices(), &[-3, -2, 2, 3]);
        assert_eq!(selection.positions(), &[0, 1, 5, 6]);
    }

    #[test]
    fn test_resolve_missing_filler() {
        let layout = [-2, -1, 1, 2];
        assert_eq!(SubcarrierSelection::resolve(&layout, &[0]), Err(0));
    }

    #[test]
    fn test_resolve_keeps_first_occurrence() {
        let layout = [-2, 0, -2, 3];
        let selection = SubcarrierSelection::resolve(&layout, &[0]).unwrap();

        assert_eq!(selection.indices(), &[-2, 3]);
        assert_eq!(selection.positions(), &[0, 3]);
    }

    #[test]
    fn test_select_unknown_configuration() {
        let frame = SyntheticCapture::new(0x7777, 20).next_frame().unwrap();
        let err = select(&SubcarrierPolicy::builtin(), &frame).unwrap_err();
        assert!(matches!(err, PolicyError::UnknownConfiguration { device_type: 0x7777, .. }));
    }

    #[test]
    fn test_select_subcarrier_not_found() {
        let frame = SyntheticCapture::new(0x2000, 40)
            .with_subcarriers(vec![-3, -2, 2, 3])
            .next_frame()
            .unwrap();
        let err = select(&SubcarrierPolicy::builtin(), &frame).unwrap_err();
        assert_eq!(
            err,
            PolicyError::SubcarrierNotFound {
                index: -1,
                device_type: 0x2000,
                bandwidth_mhz: 40
            }
        );
    }

    #[test]
    fn test_cache_reuses_layout() {
        let policy = SubcarrierPolicy::builtin();
        let mut capture = SyntheticCapture::new(0x2100, 20);
        let mut cache = SelectionCache::new();

        for frame in capture.take_frames(4).unwrap() {
            assert_eq!(cache.get(&policy, &frame).unwrap().len(), 56);
        }
        assert_eq!(cache.stats(), (3, 1));
    }

    #[test]
    fn test_cache_detects_layout_change() {
        let policy = SubcarrierPolicy::builtin();
        let mut cache = SelectionCache::new();
        let wide = SyntheticCapture::new(0x2100, 20).next_frame().unwrap();
        let narrow = SyntheticCapture::new(0x2100, 20)
            .with_subcarriers(vec![-2, -1, 0, 1, 2])
            .next_frame()
            .unwrap();

        assert_eq!(cache.get(&policy, &wide).unwrap().len(), 56);
        assert_eq!(cache.get(&policy, &narrow).unwrap().len(), 4);
        assert_eq!(cache.stats(), (0, 2));
    }
}
