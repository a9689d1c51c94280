//! Network type management.
//!
//! The [`TypeManager`] trait is everything the range service needs from the
//! component that owns the per-type allocation pools: whether a type is
//! enabled, what live usage looks like inside a range, and a hook to rebuild
//! a pool after the configured ranges change.
//!
//! [`SegmentTypeManager`] is the implementation backed by the crate's own
//! [`crate::store::Datastore`]. It also seeds default ranges from host
//! configuration and hands out, reserves and releases segments.

pub mod manager;
pub mod pool;

pub use manager::SegmentTypeManager;
pub use pool::{sync_allocations, SyncStats};

use crate::error::Result;
use crate::store::StoreState;
use crate::types::{NetworkType, RangeRecord, SegmentationId};

/// Collaborator interface consumed by [`crate::service::RangeService`]
pub trait TypeManager: Send + Sync {
    /// Whether the type driver for `network_type` is loaded
    fn network_type_supported(&self, network_type: NetworkType) -> bool;

    /// Lowest and highest live segment IDs inside `range`, or `(None, None)`
    fn network_segment_existing_range(
        &self,
        txn: &StoreState,
        network_type: NetworkType,
        physical_network: Option<&str>,
        range: &RangeRecord,
    ) -> (Option<SegmentationId>, Option<SegmentationId>);

    /// Whether any live segment falls inside `range`
    fn network_segments_exist(
        &self,
        txn: &StoreState,
        network_type: NetworkType,
        physical_network: Option<&str>,
        range: &RangeRecord,
    ) -> bool;

    /// Rebuild the allocation pool of `network_type` from the stored ranges
    fn update_network_segment_range_allocations(&self, network_type: NetworkType) -> Result<()>;
}

/// Live segment IDs of a type and physical network inside a range's bounds
pub fn segment_ids_in_range<'a>(
    txn: &'a StoreState,
    network_type: NetworkType,
    physical_network: Option<&'a str>,
    range: &'a RangeRecord,
) -> impl Iterator<Item = SegmentationId> + 'a {
    txn.segments_on(network_type, physical_network)
        .map(|segment| segment.segmentation_id)
        .filter(move |id| range.contains(*id))
}
