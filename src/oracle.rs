//! Allocation accounting for segment ranges.
//!
//! The oracle answers two questions about a range, each from a different
//! source of truth:
//!
//! - **available**: identifiers inside the range that the allocation pool
//!   reports as free;
//! - **used**: identifiers inside the range bound to live network segments,
//!   mapped to the project that owns the network.
//!
//! A live segment may exist for an identifier the pool never tracked (a
//! provider segment outside any configured range, for example), so the two
//! are always queried separately.
//!
//! Dispatch on network type goes through a flat table of
//! [`PoolDescriptor`]s. A range whose type has no descriptor is a
//! configuration inconsistency and fails with
//! [`RangeError::UnsupportedNetworkType`].

use crate::error::{RangeError, Result};
use crate::store::{PoolTable, StoreState};
use crate::types::{AllocationSnapshot, NetworkType, RangeRecord, SegmentationId};
use std::collections::{BTreeMap, HashMap};

/// Where the allocation pool of a network type lives and how it is scoped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolDescriptor {
    pub table: PoolTable,
    /// Pool rows carry a physical network that must match the range's
    pub scoped_by_physical_network: bool,
}

/// Computes [`AllocationSnapshot`]s for ranges
#[derive(Debug, Clone)]
pub struct AllocationOracle {
    strategies: HashMap<NetworkType, PoolDescriptor>,
}

impl Default for AllocationOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationOracle {
    /// Oracle knowing the pools of every segment range network type
    pub fn new() -> Self {
        let strategies = [
            (NetworkType::Vlan, PoolTable::VlanAllocations, true),
            (NetworkType::Vxlan, PoolTable::VxlanAllocations, false),
            (NetworkType::Gre, PoolTable::GreAllocations, false),
            (NetworkType::Geneve, PoolTable::GeneveAllocations, false),
        ]
        .into_iter()
        .map(|(network_type, table, scoped)| {
            (
                network_type,
                PoolDescriptor {
                    table,
                    scoped_by_physical_network: scoped,
                },
            )
        })
        .collect();
        AllocationOracle { strategies }
    }

    /// Look up the pool descriptor for a network type
    pub fn descriptor(&self, network_type: NetworkType) -> Result<PoolDescriptor> {
        self.strategies
            .get(&network_type)
            .copied()
            .ok_or(RangeError::UnsupportedNetworkType { network_type })
    }

    /// Free pool identifiers inside the range, ascending
    pub fn available(&self, txn: &StoreState, range: &RangeRecord) -> Result<Vec<SegmentationId>> {
        let descriptor = self.descriptor(range.network_type)?;
        let mut available: Vec<SegmentationId> = txn
            .pool(descriptor.table)
            .iter()
            .filter(|row| !row.allocated && range.contains(row.segmentation_id))
            .filter(|row| {
                !descriptor.scoped_by_physical_network
                    || row.physical_network.as_deref() == range.physical_network.as_deref()
            })
            .map(|row| row.segmentation_id)
            .collect();
        available.sort_unstable();
        Ok(available)
    }

    /// Live segment identifiers inside the range, mapped to owning project
    pub fn used(&self, txn: &StoreState, range: &RangeRecord) -> Result<BTreeMap<SegmentationId, String>> {
        self.descriptor(range.network_type)?;
        let used = txn
            .segments_on(range.network_type, range.physical_network.as_deref())
            .filter(|segment| range.contains(segment.segmentation_id))
            .filter_map(|segment| {
                txn.network(&segment.network_id)
                    .map(|network| (segment.segmentation_id, network.project_id.clone()))
            })
            .collect();
        Ok(used)
    }

    /// Both halves of the allocation picture, from the same read view
    pub fn snapshot(&self, txn: &StoreState, range: &RangeRecord) -> Result<AllocationSnapshot> {
        let snapshot = AllocationSnapshot {
            available: self.available(txn, range)?,
            used: self.used(txn, range)?,
        };
        log::debug!(
            "Range {} ({} {:?} {}-{}): {} available, {} used",
            range.id,
            range.network_type,
            range.physical_network,
            range.minimum,
            range.maximum,
            snapshot.available.len(),
            snapshot.used.len()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AllocationRow, Network, NetworkSegment};
    use uuid::Uuid;

    fn row(segmentation_id: u32, allocated: bool, physnet: Option<&str>) -> AllocationRow {
        AllocationRow {
            segmentation_id,
            allocated,
            physical_network: physnet.map(str::to_string),
        }
    }

    fn add_segment(
        state: &mut StoreState,
        network_type: NetworkType,
        physnet: Option<&str>,
        segmentation_id: u32,
        project: &str,
    ) {
        let network = Network {
            id: Uuid::new_v4(),
            project_id: project.to_string(),
        };
        state.put_segment(NetworkSegment {
            id: Uuid::new_v4(),
            network_id: network.id,
            network_type,
            physical_network: physnet.map(str::to_string),
            segmentation_id,
        });
        state.put_network(network);
    }

    fn vlan_range(physnet: &str, minimum: u32, maximum: u32) -> RangeRecord {
        RangeRecord::new(
            Uuid::new_v4(),
            None,
            false,
            true,
            None,
            NetworkType::Vlan,
            Some(physnet.to_string()),
            minimum,
            maximum,
        )
    }

    #[test]
    fn test_available_filters_allocated_bounds_and_physnet() {
        let mut state = StoreState::default();
        let pool = state.pool_mut(PoolTable::VlanAllocations);
        pool.push(row(99, false, Some("physnet1")));
        pool.push(row(102, false, Some("physnet1")));
        pool.push(row(100, false, Some("physnet1")));
        pool.push(row(101, true, Some("physnet1")));
        pool.push(row(103, false, Some("physnet2")));
        pool.push(row(104, false, Some("physnet1")));

        let oracle = AllocationOracle::new();
        let available = oracle.available(&state, &vlan_range("physnet1", 100, 103)).unwrap();
        assert_eq!(available, vec![100, 102]);
    }

    #[test]
    fn test_tunnel_available_ignores_physical_network() {
        let mut state = StoreState::default();
        let pool = state.pool_mut(PoolTable::VxlanAllocations);
        pool.push(row(5, false, None));
        pool.push(row(6, true, None));
        pool.push(row(7, false, None));

        let range = RangeRecord::new(Uuid::new_v4(), None, false, true, None, NetworkType::Vxlan, None, 1, 10);
        let oracle = AllocationOracle::new();
        assert_eq!(oracle.available(&state, &range).unwrap(), vec![5, 7]);
        // Different pool table entirely
        let gre = RangeRecord { network_type: NetworkType::Gre, ..range };
        assert!(oracle.available(&state, &gre).unwrap().is_empty());
    }

    #[test]
    fn test_used_matches_type_physnet_and_bounds() {
        let mut state = StoreState::default();
        add_segment(&mut state, NetworkType::Vlan, Some("physnet1"), 120, "p1");
        add_segment(&mut state, NetworkType::Vlan, Some("physnet1"), 250, "p2");
        add_segment(&mut state, NetworkType::Vlan, Some("physnet2"), 130, "p3");
        add_segment(&mut state, NetworkType::Vxlan, None, 140, "p4");

        let oracle = AllocationOracle::new();
        let used = oracle.used(&state, &vlan_range("physnet1", 100, 200)).unwrap();
        assert_eq!(used.len(), 1);
        assert_eq!(used.get(&120).map(String::as_str), Some("p1"));
    }

    #[test]
    fn test_used_reports_segments_outside_the_pool() {
        // A live segment with no pool row at all still shows up as used
        let mut state = StoreState::default();
        add_segment(&mut state, NetworkType::Gre, None, 42, "p1");
        let range = RangeRecord::new(Uuid::new_v4(), None, false, true, None, NetworkType::Gre, None, 1, 100);

        let snapshot = AllocationOracle::new().snapshot(&state, &range).unwrap();
        assert!(snapshot.available.is_empty());
        assert_eq!(snapshot.used.get(&42).map(String::as_str), Some("p1"));
    }

    #[test]
    fn test_missing_strategy_is_unsupported() {
        let mut strategies = HashMap::new();
        strategies.insert(
            NetworkType::Vlan,
            PoolDescriptor {
                table: PoolTable::VlanAllocations,
                scoped_by_physical_network: true,
            },
        );
        let oracle = AllocationOracle { strategies };
        let range = RangeRecord::new(Uuid::new_v4(), None, false, true, None, NetworkType::Geneve, None, 1, 10);

        let state = StoreState::default();
        assert!(matches!(
            oracle.available(&state, &range),
            Err(RangeError::UnsupportedNetworkType { network_type: NetworkType::Geneve })
        ));
        assert!(matches!(
            oracle.used(&state, &range),
            Err(RangeError::UnsupportedNetworkType { .. })
        ));
    }
}
