//! Allocation pool recomputation.
//!
//! Brings one pool table in line with the ranges currently stored for its
//! network type. Identifiers covered by a range but missing from the pool
//! are added as free. Free rows that no range covers any more are dropped.
//! Allocated rows are never touched, even when they fall outside every
//! range; they are cleaned up when released.

use crate::oracle::PoolDescriptor;
use crate::store::StoreState;
use crate::types::{AllocationRow, NetworkType, SegmentationId};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Row changes made by one recomputation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub added: usize,
    pub removed: usize,
}

/// Merged `(minimum, maximum)` intervals covered by ranges, per physical network
type Coverage = BTreeMap<Option<String>, Vec<(SegmentationId, SegmentationId)>>;

fn scope(descriptor: PoolDescriptor, physical_network: Option<&str>) -> Option<&str> {
    physical_network.filter(|_| descriptor.scoped_by_physical_network)
}

fn row_order(a: &AllocationRow, b: &AllocationRow) -> Ordering {
    (a.physical_network.as_deref(), a.segmentation_id).cmp(&(b.physical_network.as_deref(), b.segmentation_id))
}

fn coverage(txn: &StoreState, descriptor: PoolDescriptor, network_type: NetworkType) -> Coverage {
    let mut coverage = Coverage::new();
    for range in txn.ranges().filter(|range| range.network_type == network_type) {
        coverage
            .entry(scope(descriptor, range.physical_network.as_deref()).map(str::to_string))
            .or_default()
            .push((range.minimum, range.maximum));
    }

    for intervals in coverage.values_mut() {
        intervals.sort_unstable();
        let mut merged: Vec<(SegmentationId, SegmentationId)> = Vec::with_capacity(intervals.len());
        for &(minimum, maximum) in intervals.iter() {
            match merged.last_mut() {
                Some(last) if minimum <= last.1.saturating_add(1) => last.1 = last.1.max(maximum),
                _ => merged.push((minimum, maximum)),
            }
        }
        *intervals = merged;
    }
    coverage
}

fn covered_by(coverage: &Coverage, physical_network: Option<&str>, id: SegmentationId) -> bool {
    coverage
        .iter()
        .find(|(key, _)| key.as_deref() == physical_network)
        .map_or(false, |(_, intervals)| {
            intervals.iter().any(|&(minimum, maximum)| minimum <= id && id <= maximum)
        })
}

/// Whether some stored range of `network_type` covers the identifier
pub fn is_covered(
    txn: &StoreState,
    descriptor: PoolDescriptor,
    network_type: NetworkType,
    physical_network: Option<&str>,
    id: SegmentationId,
) -> bool {
    txn.ranges().any(|range| {
        range.network_type == network_type
            && range.contains(id)
            && (!descriptor.scoped_by_physical_network
                || range.physical_network.as_deref() == physical_network)
    })
}

/// Recompute the pool table of `network_type` from the stored ranges.
///
/// Coverage is kept as merged intervals and new rows are found by binary
/// search against the existing table, so only the rows actually added are
/// allocated.
pub fn sync_allocations(txn: &mut StoreState, descriptor: PoolDescriptor, network_type: NetworkType) -> SyncStats {
    let coverage = coverage(txn, descriptor, network_type);

    let rows = txn.pool_mut(descriptor.table);
    let before = rows.len();
    rows.retain(|row| {
        row.allocated
            || covered_by(
                &coverage,
                scope(descriptor, row.physical_network.as_deref()),
                row.segmentation_id,
            )
    });
    let removed = before - rows.len();
    rows.sort_by(row_order);

    let mut missing = Vec::new();
    for (physical_network, intervals) in &coverage {
        let physical_network = physical_network.as_deref();
        for &(minimum, maximum) in intervals {
            for segmentation_id in minimum..=maximum {
                let found = rows.binary_search_by(|row| {
                    (row.physical_network.as_deref(), row.segmentation_id).cmp(&(physical_network, segmentation_id))
                });
                if found.is_err() {
                    missing.push(AllocationRow {
                        segmentation_id,
                        allocated: false,
                        physical_network: physical_network.map(str::to_string),
                    });
                }
            }
        }
    }

    let added = missing.len();
    if added > 0 {
        rows.extend(missing);
        rows.sort_by(row_order);
    }
    SyncStats { added, removed }
}
