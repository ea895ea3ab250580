//! Subcarrier policy: which tones of a frame are genuine measurements.
//!
//! The upstream decoder fills in tones the radio never measures so that
//! every frame spans a contiguous band. The policy table records, per
//! device and bandwidth, which indices are such filler; everything else
//! in the frame's index list is kept, in index-list order.

mod selection;
mod table;

pub use selection::{select, SelectionCache, SubcarrierSelection};
pub use table::{
    default_interpolated, PolicyEntry, PolicyError, SubcarrierPolicy, SUPPORTED_BANDWIDTHS,
};
