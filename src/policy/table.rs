//! Device/bandwidth keyed table of interpolated subcarriers.

use crate::capture::DeviceModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Bandwidths (MHz) covered by the built-in table.
pub const SUPPORTED_BANDWIDTHS: [u16; 4] = [20, 40, 80, 160];

/// Returns the filler indices the upstream decoder inserts at a bandwidth.
///
/// 40 MHz captures are interpolated at the three center tones, every
/// other bandwidth at the DC tone only.
pub fn default_interpolated(bandwidth_mhz: u16) -> &'static [i16] {
    match bandwidth_mhz {
        40 => &[-1, 0, 1],
        _ => &[0],
    }
}

/// Policy lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// The table has no entry for the frame's device and bandwidth.
    #[error("no subcarrier policy for device {device_type:#06x} at {bandwidth_mhz} MHz")]
    UnknownConfiguration {
        /// Raw device code of the frame.
        device_type: u16,
        /// Channel bandwidth of the frame in MHz.
        bandwidth_mhz: u16,
    },

    /// A filler index of the policy does not occur in the frame.
    #[error(
        "subcarrier {index} expected by the policy for device {device_type:#06x} \
         at {bandwidth_mhz} MHz is missing from the frame"
    )]
    SubcarrierNotFound {
        /// Filler index missing from the frame.
        index: i16,
        /// Raw device code of the frame.
        device_type: u16,
        /// Channel bandwidth of the frame in MHz.
        bandwidth_mhz: u16,
    },
}

/// One table entry, as written in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    /// Device model name, e.g. `"AX210"`.
    pub device: DeviceModel,
    /// Channel bandwidth in MHz.
    pub bandwidth: u16,
    /// Subcarrier indices filled in by interpolation.
    pub interpolated: Vec<i16>,
}

/// Immutable mapping from (device, bandwidth) to interpolated indices.
///
/// A frame keeps every subcarrier not listed for its configuration.
/// Every listed index must occur in the frame's index list: a frame that
/// lacks one, such as a layout without a DC tone, fails with
/// [`PolicyError::SubcarrierNotFound`] instead of passing through
/// unfiltered. The table is built once at startup and only read afterwards.
#[derive(Debug, Clone)]
pub struct SubcarrierPolicy {
    entries: BTreeMap<(DeviceModel, u16), Arc<[i16]>>,
}

impl SubcarrierPolicy {
    /// Creates the built-in table covering every known device.
    pub fn builtin() -> Self {
        let entries: BTreeMap<_, Arc<[i16]>> = DeviceModel::ALL
            .into_iter()
            .flat_map(|device| {
                SUPPORTED_BANDWIDTHS
                    .into_iter()
                    .map(move |bw| ((device, bw), Arc::from(default_interpolated(bw))))
            })
            .collect();
        Self { entries }
    }

    /// Returns this table with the given entries added or replaced.
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = PolicyEntry>) -> Self {
        for entry in entries {
            let mut interpolated = entry.interpolated;
            interpolated.sort_unstable();
            interpolated.dedup();
            tracing::debug!(
                device = %entry.device,
                bandwidth = entry.bandwidth,
                interpolated = ?interpolated,
                "Subcarrier policy entry"
            );
            self.entries
                .insert((entry.device, entry.bandwidth), Arc::from(interpolated));
        }
        self
    }

    /// Looks up the interpolated indices for a raw device code and bandwidth.
    ///
    /// The returned slice is sorted ascending and identical on every call.
    pub fn lookup(&self, device_type: u16, bandwidth_mhz: u16) -> Result<&[i16], PolicyError> {
        DeviceModel::from_code(device_type)
            .and_then(|device| self.entries.get(&(device, bandwidth_mhz)))
            .map(|indices| &indices[..])
            .ok_or(PolicyError::UnknownConfiguration {
                device_type,
                bandwidth_mhz,
            })
    }

    /// Returns the number of configurations in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SubcarrierPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}
