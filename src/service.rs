//! Range service: mutation safety on top of the repository.
//!
//! Every mutation runs in a single datastore transaction covering the
//! existence check, the invariant checks against live usage and the write.
//! Any failure rolls the whole transaction back.
//!
//! Rules enforced here:
//!
//! - ranges can only be created for network types that are both range-capable
//!   and enabled in the type manager;
//! - default ranges (seeded from host configuration) cannot be updated or
//!   deleted;
//! - an update is refused when live segments exist in the range unless it
//!   strictly widens both bounds;
//! - a delete is refused while any live segment falls inside the range.
//!
//! After a mutation commits, the type manager is asked to recompute the
//! allocation pool of the affected network type. That call runs outside the
//! transaction and its failure does not undo the mutation.

use crate::error::{RangeError, Result};
use crate::repository::RangeRepository;
use crate::store::{Datastore, Pager, RangeFilters, StoreState};
use crate::type_manager::TypeManager;
use crate::types::{CreateRange, NetworkType, RangeRecord, RangeView, UpdateRange};
use std::sync::Arc;
use uuid::Uuid;

pub struct RangeService {
    db: Arc<Datastore>,
    repository: RangeRepository,
    type_manager: Arc<dyn TypeManager>,
}

impl RangeService {
    pub fn new(db: Arc<Datastore>, repository: RangeRepository, type_manager: Arc<dyn TypeManager>) -> Self {
        RangeService {
            db,
            repository,
            type_manager,
        }
    }

    fn supported_type(&self, network_type: &str) -> Result<NetworkType> {
        let not_supported = || RangeError::NetworkTypeNotSupported {
            network_type: network_type.to_string(),
        };
        let parsed: NetworkType = network_type.parse().map_err(|_| not_supported())?;
        if !self.type_manager.network_type_supported(parsed) {
            return Err(not_supported());
        }
        Ok(parsed)
    }

    /// Whether applying `partial` could strand live segments.
    ///
    /// The live bounds come from the type manager, not from the stored
    /// record. When segments exist, anything short of moving the minimum
    /// strictly down and the maximum strictly up counts as impacting.
    fn is_existing_range_impacted(&self, txn: &StoreState, existing: &RangeRecord, partial: &UpdateRange) -> bool {
        let new_minimum = partial.minimum.unwrap_or(existing.minimum);
        let new_maximum = partial.maximum.unwrap_or(existing.maximum);
        let live = self.type_manager.network_segment_existing_range(
            txn,
            existing.network_type,
            existing.physical_network.as_deref(),
            existing,
        );

        let impacted = match live {
            (Some(live_minimum), Some(live_maximum)) => new_minimum >= live_minimum || new_maximum <= live_maximum,
            _ => false,
        };
        log::debug!(
            "Update of range {} to {}-{} against live bounds {:?}: impacted={}",
            existing.id,
            new_minimum,
            new_maximum,
            live,
            impacted
        );
        impacted
    }

    fn recompute_allocations(&self, network_type: NetworkType) {
        if let Err(e) = self.type_manager.update_network_segment_range_allocations(network_type) {
            log::warn!("Failed to recompute {} allocation pool: {}", network_type, e);
        }
    }

    pub fn create(&self, request: &CreateRange) -> Result<RangeView> {
        let network_type = self.supported_type(&request.network_type)?;
        let view = self.db.transaction(|txn| self.repository.create(txn, request))?;
        log::info!(
            "Created {} network segment range {} ({:?} {}-{})",
            network_type,
            view.id,
            view.physical_network,
            view.minimum,
            view.maximum
        );

        self.recompute_allocations(network_type);
        Ok(view)
    }

    pub fn update(&self, id: Uuid, partial: &UpdateRange) -> Result<RangeView> {
        let view = self.db.transaction(|txn| {
            let existing = self
                .repository
                .get_by_id(txn, id)
                .ok_or(RangeError::NotFound { range_id: id })?;
            if existing.default {
                return Err(RangeError::DefaultRangeReadOnly { range_id: id });
            }
            if self.is_existing_range_impacted(txn, &existing, partial) {
                return Err(RangeError::RangeReferencedByProject { range_id: id });
            }
            self.repository.update(txn, id, partial)
        })?;
        log::info!(
            "Updated network segment range {} ({} {}-{})",
            view.id,
            view.network_type,
            view.minimum,
            view.maximum
        );

        self.recompute_allocations(view.network_type);
        Ok(view)
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        let removed = self.db.transaction(|txn| {
            let existing = self
                .repository
                .get_by_id(txn, id)
                .ok_or(RangeError::NotFound { range_id: id })?;
            if existing.default {
                return Err(RangeError::DefaultRangeReadOnly { range_id: id });
            }
            if self.type_manager.network_segments_exist(
                txn,
                existing.network_type,
                existing.physical_network.as_deref(),
                &existing,
            ) {
                return Err(RangeError::RangeReferencedByProject { range_id: id });
            }
            self.repository.delete(txn, id)
        })?;
        log::info!("Deleted {} network segment range {}", removed.network_type, removed.id);

        self.recompute_allocations(removed.network_type);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<RangeView> {
        self.db.read(|txn| self.repository.show(txn, id))
    }

    pub fn list(&self, filters: &RangeFilters, pager: &Pager) -> Result<Vec<RangeView>> {
        self.db.read(|txn| self.repository.list(txn, filters, pager))
    }
}
