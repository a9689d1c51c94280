//! Persistence of segment range records.
//!
//! The repository validates and stores ranges and renders them with their
//! live allocation data. It knows nothing about live usage conflicts or
//! default-range protection; those rules belong to
//! [`crate::service::RangeService`], which is also the only caller that
//! triggers allocation pool recomputation.

use crate::error::{RangeError, Result};
use crate::oracle::AllocationOracle;
use crate::store::{Pager, RangeFilters, StoreState};
use crate::types::{
    CreateRange, NetworkType, RangeRecord, RangeView, SegmentationId, UnknownNetworkType, UpdateRange,
};
use crate::validation::{BoundsValidator, SegmentationBounds};
use uuid::Uuid;

/// Merge a partial update onto an existing record.
///
/// Fields missing from `partial` keep their current values. The ownership
/// rule is re-applied: a range that ends up shared has no project.
pub fn apply_partial(existing: &RangeRecord, partial: &UpdateRange) -> RangeRecord {
    RangeRecord::new(
        existing.id,
        partial.name.clone().or_else(|| existing.name.clone()),
        existing.default,
        partial.shared.unwrap_or(existing.shared),
        partial.project_id.clone().or_else(|| existing.project_id.clone()),
        existing.network_type,
        existing.physical_network.clone(),
        partial.minimum.unwrap_or(existing.minimum),
        partial.maximum.unwrap_or(existing.maximum),
    )
}

/// CRUD access to range records
pub struct RangeRepository {
    validator: Box<dyn BoundsValidator>,
    oracle: AllocationOracle,
}

impl Default for RangeRepository {
    fn default() -> Self {
        Self::new(Box::new(SegmentationBounds), AllocationOracle::new())
    }
}

impl RangeRepository {
    pub fn new(validator: Box<dyn BoundsValidator>, oracle: AllocationOracle) -> Self {
        RangeRepository { validator, oracle }
    }

    pub fn oracle(&self) -> &AllocationOracle {
        &self.oracle
    }

    /// Check bounds and field consistency of a complete record
    pub fn validate(
        &self,
        network_type: NetworkType,
        physical_network: Option<&str>,
        shared: bool,
        project_id: Option<&str>,
        minimum: SegmentationId,
        maximum: SegmentationId,
    ) -> Result<()> {
        self.validator.verify_range(network_type, minimum, maximum)?;
        if network_type.is_vlan() && physical_network.map_or(true, str::is_empty) {
            return Err(RangeError::invalid(
                "physical_network",
                "a physical network is required for vlan ranges",
            ));
        }
        if !shared && project_id.map_or(true, str::is_empty) {
            return Err(RangeError::invalid(
                "project_id",
                "a project is required for ranges that are not shared",
            ));
        }
        Ok(())
    }

    fn validate_record(&self, record: &RangeRecord) -> Result<()> {
        self.validate(
            record.network_type,
            record.physical_network.as_deref(),
            record.shared,
            record.project_id.as_deref(),
            record.minimum,
            record.maximum,
        )
    }

    /// Render a record together with its live allocation snapshot
    pub fn view(&self, txn: &StoreState, record: RangeRecord) -> Result<RangeView> {
        let snapshot = self.oracle.snapshot(txn, &record)?;
        Ok(RangeView::new(record, snapshot))
    }

    /// Fetch a record, failing with `NotFound` if it does not exist
    pub fn get(&self, txn: &StoreState, id: Uuid) -> Result<RangeRecord> {
        txn.range(&id).cloned().ok_or(RangeError::NotFound { range_id: id })
    }

    /// Fetch a record, returning `None` if it does not exist
    pub fn get_by_id(&self, txn: &StoreState, id: Uuid) -> Option<RangeRecord> {
        self.get(txn, id).ok()
    }

    pub fn show(&self, txn: &StoreState, id: Uuid) -> Result<RangeView> {
        let record = self.get(txn, id)?;
        self.view(txn, record)
    }

    pub fn list(&self, txn: &StoreState, filters: &RangeFilters, pager: &Pager) -> Result<Vec<RangeView>> {
        txn.query_ranges(filters, pager)?
            .into_iter()
            .map(|record| self.view(txn, record))
            .collect()
    }

    /// Validate and store a new administrator range
    pub fn create(&self, txn: &mut StoreState, request: &CreateRange) -> Result<RangeView> {
        let network_type: NetworkType = request
            .network_type
            .parse()
            .map_err(|e: UnknownNetworkType| RangeError::invalid("network_type", e.to_string()))?;
        let physical_network = if network_type.is_vlan() {
            request.physical_network.as_deref()
        } else {
            None
        };
        self.validate(
            network_type,
            physical_network,
            request.shared,
            request.project_id.as_deref(),
            request.minimum,
            request.maximum,
        )?;

        let record = RangeRecord::new(
            Uuid::new_v4(),
            request.name.clone(),
            false,
            request.shared,
            request.project_id.clone(),
            network_type,
            request.physical_network.clone(),
            request.minimum,
            request.maximum,
        );
        txn.put_range(record.clone());
        self.view(txn, record)
    }

    /// Validate and store a range sourced from host configuration
    pub fn create_default(
        &self,
        txn: &mut StoreState,
        network_type: NetworkType,
        physical_network: Option<&str>,
        minimum: SegmentationId,
        maximum: SegmentationId,
    ) -> Result<RangeRecord> {
        let record = RangeRecord::new(
            Uuid::new_v4(),
            None,
            true,
            true,
            None,
            network_type,
            physical_network.map(str::to_string),
            minimum,
            maximum,
        );
        self.validate_record(&record)?;
        txn.put_range(record.clone());
        Ok(record)
    }

    /// Merge `partial` onto the stored record, re-validate and store it
    pub fn update(&self, txn: &mut StoreState, id: Uuid, partial: &UpdateRange) -> Result<RangeView> {
        let existing = self.get(txn, id)?;
        let merged = apply_partial(&existing, partial);
        self.validate_record(&merged)?;
        txn.put_range(merged.clone());
        self.view(txn, merged)
    }

    /// Remove a record; returns what was removed
    pub fn delete(&self, txn: &mut StoreState, id: Uuid) -> Result<RangeRecord> {
        txn.remove_range(&id).ok_or(RangeError::NotFound { range_id: id })
    }
}
