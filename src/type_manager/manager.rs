//! Datastore-backed type manager.

use super::pool::{is_covered, sync_allocations};
use super::{segment_ids_in_range, TypeManager};
use crate::config::{Config, ConfiguredRange, ValidationError};
use crate::error::{RangeError, Result};
use crate::oracle::AllocationOracle;
use crate::repository::RangeRepository;
use crate::store::{Datastore, StoreState};
use crate::types::{AllocationRow, Network, NetworkSegment, NetworkType, RangeRecord, SegmentationId};
use crate::validation::id_space;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Type manager operating on a shared [`Datastore`]
pub struct SegmentTypeManager {
    db: Arc<Datastore>,
    repository: RangeRepository,
    enabled: BTreeSet<NetworkType>,
    static_ranges: Vec<ConfiguredRange>,
    /// Physical networks declared in `network_vlan_ranges`
    physical_networks: BTreeSet<String>,
}

impl SegmentTypeManager {
    /// Build a type manager from host configuration
    pub fn new(db: Arc<Datastore>, config: &Config) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(SegmentTypeManager {
            db,
            repository: RangeRepository::default(),
            enabled: config.enabled_types()?,
            static_ranges: config.default_ranges()?,
            physical_networks: config.physical_networks()?.into_iter().collect(),
        })
    }

    /// Type manager with the given drivers enabled and no static ranges
    pub fn with_types(db: Arc<Datastore>, enabled: impl IntoIterator<Item = NetworkType>) -> Self {
        SegmentTypeManager {
            db,
            repository: RangeRepository::default(),
            enabled: enabled.into_iter().collect(),
            static_ranges: Vec::new(),
            physical_networks: BTreeSet::new(),
        }
    }

    pub fn enabled_types(&self) -> impl Iterator<Item = NetworkType> + '_ {
        self.enabled.iter().copied()
    }

    fn oracle(&self) -> &AllocationOracle {
        self.repository.oracle()
    }

    fn ensure_supported(&self, network_type: NetworkType) -> Result<()> {
        if self.network_type_supported(network_type) {
            Ok(())
        } else {
            Err(RangeError::NetworkTypeNotSupported {
                network_type: network_type.to_string(),
            })
        }
    }

    fn ensure_known_physical_network(&self, physical_network: &str) -> Result<()> {
        if self.physical_networks.contains(physical_network) {
            Ok(())
        } else {
            Err(RangeError::invalid(
                "physical_network",
                format!("physical_network '{}' unknown for VLAN provider network", physical_network),
            ))
        }
    }

    /// Replace the default ranges of every enabled type with the statically
    /// configured ones, then rebuild each enabled pool.
    pub fn initialize_network_segment_range_support(&self) -> Result<()> {
        self.db.transaction(|txn| {
            let stale: Vec<Uuid> = txn
                .ranges()
                .filter(|range| range.default && self.enabled.contains(&range.network_type))
                .map(|range| range.id)
                .collect();
            for id in &stale {
                txn.remove_range(id);
            }

            for range in &self.static_ranges {
                let record = self.repository.create_default(
                    txn,
                    range.network_type,
                    range.physical_network.as_deref(),
                    range.minimum,
                    range.maximum,
                )?;
                log::info!(
                    "Seeded default {} range {:?} {}-{} ({})",
                    record.network_type,
                    record.physical_network,
                    record.minimum,
                    record.maximum,
                    record.id
                );
            }
            log::debug!("Replaced {} default ranges", stale.len());
            Ok::<_, RangeError>(())
        })?;

        for network_type in self.enabled_types() {
            self.update_network_segment_range_allocations(network_type)?;
        }
        Ok(())
    }

    fn bind_segment(
        txn: &mut StoreState,
        network_type: NetworkType,
        physical_network: Option<String>,
        segmentation_id: SegmentationId,
        project_id: &str,
    ) -> NetworkSegment {
        let network = Network {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
        };
        let segment = NetworkSegment {
            id: Uuid::new_v4(),
            network_id: network.id,
            network_type,
            physical_network,
            segmentation_id,
        };
        txn.put_network(network);
        txn.put_segment(segment.clone());
        segment
    }

    /// Take the lowest free identifier from the pool and bind it to a new
    /// network owned by `project_id`.
    ///
    /// For VLAN, `physical_network` restricts the search; when absent any
    /// physical network may be used.
    pub fn allocate_segment(
        &self,
        network_type: NetworkType,
        physical_network: Option<&str>,
        project_id: &str,
    ) -> Result<NetworkSegment> {
        self.ensure_supported(network_type)?;
        let descriptor = self.oracle().descriptor(network_type)?;
        let physical_network = physical_network.filter(|_| descriptor.scoped_by_physical_network);
        if let Some(physical_network) = physical_network {
            self.ensure_known_physical_network(physical_network)?;
        }

        let segment = self.db.transaction(|txn| {
            let candidate = txn
                .pool(descriptor.table)
                .iter()
                .filter(|row| !row.allocated)
                .filter(|row| physical_network.map_or(true, |p| row.physical_network.as_deref() == Some(p)))
                .min_by_key(|row| row.segmentation_id)
                .cloned()
                .ok_or_else(|| RangeError::PoolExhausted {
                    network_type,
                    physical_network: physical_network.map(str::to_string),
                })?;

            txn.set_allocated(
                descriptor.table,
                candidate.physical_network.as_deref(),
                candidate.segmentation_id,
                true,
            );
            Ok::<_, RangeError>(Self::bind_segment(
                txn,
                network_type,
                candidate.physical_network,
                candidate.segmentation_id,
                project_id,
            ))
        })?;

        log::info!(
            "Allocated {} segment {} ({:?}) for project {}",
            network_type,
            segment.segmentation_id,
            segment.physical_network,
            project_id
        );
        Ok(segment)
    }

    /// Reserve a specific identifier for a provider network.
    ///
    /// Identifiers outside every range can still be reserved; they get an
    /// allocated pool row that disappears again on release.
    pub fn reserve_segment(
        &self,
        network_type: NetworkType,
        physical_network: Option<&str>,
        segmentation_id: SegmentationId,
        project_id: &str,
    ) -> Result<NetworkSegment> {
        self.ensure_supported(network_type)?;
        let descriptor = self.oracle().descriptor(network_type)?;
        let (low, high) = id_space(network_type);
        if !(low..=high).contains(&segmentation_id) {
            return Err(RangeError::invalid(
                "segmentation_id",
                format!("{} is not a valid {} identifier", segmentation_id, network_type),
            ));
        }
        let physical_network = if descriptor.scoped_by_physical_network {
            let physical_network = physical_network.filter(|p| !p.is_empty()).ok_or_else(|| {
                RangeError::invalid("physical_network", "a physical network is required for vlan segments")
            })?;
            self.ensure_known_physical_network(physical_network)?;
            Some(physical_network)
        } else {
            None
        };

        let segment = self.db.transaction(|txn| {
            let in_use = RangeError::SegmentInUse {
                network_type,
                segmentation_id,
            };
            if txn
                .segments_on(network_type, physical_network)
                .any(|segment| segment.segmentation_id == segmentation_id)
            {
                return Err(in_use);
            }

            let allocated = txn
                .pool(descriptor.table)
                .iter()
                .find(|row| {
                    row.segmentation_id == segmentation_id && row.physical_network.as_deref() == physical_network
                })
                .map(|row| row.allocated);
            match allocated {
                Some(true) => return Err(in_use),
                Some(false) => {
                    txn.set_allocated(descriptor.table, physical_network, segmentation_id, true);
                }
                None => {
                    log::debug!(
                        "{} segment {} is outside every range, tracking it as allocated",
                        network_type,
                        segmentation_id
                    );
                    txn.pool_mut(descriptor.table).push(AllocationRow {
                        segmentation_id,
                        allocated: true,
                        physical_network: physical_network.map(str::to_string),
                    });
                }
            }
            Ok(Self::bind_segment(
                txn,
                network_type,
                physical_network.map(str::to_string),
                segmentation_id,
                project_id,
            ))
        })?;

        log::info!(
            "Reserved {} segment {} ({:?}) for project {}",
            network_type,
            segmentation_id,
            segment.physical_network,
            project_id
        );
        Ok(segment)
    }

    /// Unbind a live segment and return its identifier to the pool
    pub fn release_segment(&self, segment_id: Uuid) -> Result<NetworkSegment> {
        let oracle = self.oracle();
        let segment = self.db.transaction(|txn| {
            let segment = txn
                .remove_segment(&segment_id)
                .ok_or(RangeError::SegmentNotFound { segment_id })?;
            txn.remove_network(&segment.network_id);

            let descriptor = oracle.descriptor(segment.network_type)?;
            let physical_network = segment.physical_network.as_deref();
            if is_covered(txn, descriptor, segment.network_type, physical_network, segment.segmentation_id) {
                txn.set_allocated(descriptor.table, physical_network, segment.segmentation_id, false);
            } else {
                txn.pool_mut(descriptor.table).retain(|row| {
                    !(row.segmentation_id == segment.segmentation_id
                        && row.physical_network.as_deref() == physical_network)
                });
            }
            Ok::<_, RangeError>(segment)
        })?;

        log::info!(
            "Released {} segment {} ({:?})",
            segment.network_type,
            segment.segmentation_id,
            segment.physical_network
        );
        Ok(segment)
    }
}

impl TypeManager for SegmentTypeManager {
    fn network_type_supported(&self, network_type: NetworkType) -> bool {
        self.enabled.contains(&network_type)
    }

    fn network_segment_existing_range(
        &self,
        txn: &StoreState,
        network_type: NetworkType,
        physical_network: Option<&str>,
        range: &RangeRecord,
    ) -> (Option<SegmentationId>, Option<SegmentationId>) {
        segment_ids_in_range(txn, network_type, physical_network, range).fold((None, None), |(low, high), id| {
            (
                Some(low.map_or(id, |l: SegmentationId| l.min(id))),
                Some(high.map_or(id, |h: SegmentationId| h.max(id))),
            )
        })
    }

    fn network_segments_exist(
        &self,
        txn: &StoreState,
        network_type: NetworkType,
        physical_network: Option<&str>,
        range: &RangeRecord,
    ) -> bool {
        segment_ids_in_range(txn, network_type, physical_network, range)
            .next()
            .is_some()
    }

    fn update_network_segment_range_allocations(&self, network_type: NetworkType) -> Result<()> {
        let descriptor = self.oracle().descriptor(network_type)?;
        let stats = self
            .db
            .transaction(|txn| Ok::<_, RangeError>(sync_allocations(txn, descriptor, network_type)))?;
        log::info!(
            "Recomputed {} allocation pool: {} added, {} removed",
            network_type,
            stats.added,
            stats.removed
        );
        Ok(())
    }
}
