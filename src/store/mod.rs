//! In-memory object store with transactional access.
//!
//! The store holds four kinds of rows: segment ranges, the per-type
//! allocation pools, tenant networks and the live segments bound to them.
//! Callers never touch the lock directly; they run closures through
//! [`Datastore::read`] or [`Datastore::transaction`] and pass the borrowed
//! [`StoreState`] down to whatever needs to share the same transaction.

pub mod pager;

pub use pager::{Pager, RangeFilters, SortField, SortKey};

use crate::error::{RangeError, Result};
use crate::types::{AllocationRow, Network, NetworkSegment, NetworkType, RangeRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Allocation pool tables, one per network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolTable {
    VlanAllocations,
    VxlanAllocations,
    GreAllocations,
    GeneveAllocations,
}

/// Snapshot of every table in the store.
///
/// Tables are shared between clones and copied on first write, so a
/// transaction only pays for the tables it modifies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    ranges: Arc<BTreeMap<Uuid, RangeRecord>>,
    #[serde(default)]
    pools: BTreeMap<PoolTable, Arc<Vec<AllocationRow>>>,
    #[serde(default)]
    networks: Arc<BTreeMap<Uuid, Network>>,
    #[serde(default)]
    segments: Arc<BTreeMap<Uuid, NetworkSegment>>,
}

impl StoreState {
    pub fn range(&self, id: &Uuid) -> Option<&RangeRecord> {
        self.ranges.get(id)
    }

    pub fn ranges(&self) -> impl Iterator<Item = &RangeRecord> {
        self.ranges.values()
    }

    /// Insert or replace a range row
    pub fn put_range(&mut self, record: RangeRecord) {
        Arc::make_mut(&mut self.ranges).insert(record.id, record);
    }

    pub fn remove_range(&mut self, id: &Uuid) -> Option<RangeRecord> {
        Arc::make_mut(&mut self.ranges).remove(id)
    }

    /// Filtered, sorted and paginated range query
    pub fn query_ranges(&self, filters: &RangeFilters, pager: &Pager) -> Result<Vec<RangeRecord>> {
        let rows = self
            .ranges
            .values()
            .filter(|record| filters.matches(record))
            .cloned()
            .collect();
        pager.apply(rows)
    }

    /// Rows of one allocation pool table
    pub fn pool(&self, table: PoolTable) -> &[AllocationRow] {
        self.pools.get(&table).map(|rows| rows.as_slice()).unwrap_or(&[])
    }

    pub fn pool_mut(&mut self, table: PoolTable) -> &mut Vec<AllocationRow> {
        Arc::make_mut(self.pools.entry(table).or_default())
    }

    /// Flip the `allocated` flag of an existing pool row.
    /// Returns false when no such row exists.
    pub fn set_allocated(
        &mut self,
        table: PoolTable,
        physical_network: Option<&str>,
        segmentation_id: u32,
        allocated: bool,
    ) -> bool {
        match self.pool_mut(table).iter_mut().find(|row| {
            row.segmentation_id == segmentation_id && row.physical_network.as_deref() == physical_network
        }) {
            Some(row) => {
                row.allocated = allocated;
                true
            }
            None => false,
        }
    }

    pub fn network(&self, id: &Uuid) -> Option<&Network> {
        self.networks.get(id)
    }

    pub fn put_network(&mut self, network: Network) {
        Arc::make_mut(&mut self.networks).insert(network.id, network);
    }

    pub fn remove_network(&mut self, id: &Uuid) -> Option<Network> {
        Arc::make_mut(&mut self.networks).remove(id)
    }

    pub fn segment(&self, id: &Uuid) -> Option<&NetworkSegment> {
        self.segments.get(id)
    }

    pub fn put_segment(&mut self, segment: NetworkSegment) {
        Arc::make_mut(&mut self.segments).insert(segment.id, segment);
    }

    pub fn remove_segment(&mut self, id: &Uuid) -> Option<NetworkSegment> {
        Arc::make_mut(&mut self.segments).remove(id)
    }

    /// Live segments of a type on a physical network (`None` matches `None`)
    pub fn segments_on<'a>(
        &'a self,
        network_type: NetworkType,
        physical_network: Option<&'a str>,
    ) -> impl Iterator<Item = &'a NetworkSegment> + 'a {
        self.segments.values().filter(move |segment| {
            segment.network_type == network_type && segment.physical_network.as_deref() == physical_network
        })
    }
}

/// Thread-safe handle to the store
#[derive(Debug, Default)]
pub struct Datastore {
    state: RwLock<StoreState>,
}

impl Datastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Datastore {
            state: RwLock::new(state),
        }
    }

    /// Load a store from a JSON state file; a missing file yields an empty store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("State file {:?} not found, starting with an empty store", path);
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        let state: StoreState = serde_json::from_str(&content)?;
        log::debug!(
            "Loaded {} ranges and {} segments from {:?}",
            state.ranges.len(),
            state.segments.len(),
            path
        );
        Ok(Self::from_state(state))
    }

    /// Write the committed state to a JSON file.
    ///
    /// The state is written to a temporary file next to `path` and renamed
    /// over it, so readers never see a partially written file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.read(|txn| Ok::<_, RangeError>(serde_json::to_string_pretty(txn)?))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(content.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Run a closure against a read-only view of the committed state
    pub fn read<T, E>(&self, f: impl FnOnce(&StoreState) -> Result<T, E>) -> Result<T, E> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run a closure as one atomic transaction.
    ///
    /// The closure works on a private copy of the state which replaces the
    /// committed state only if it returns `Ok`. The copy shares unmodified
    /// tables with the committed state. The exclusive lock is held
    /// for the whole closure, so every check it makes stays valid until
    /// commit.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&mut StoreState) -> Result<T, E>) -> Result<T, E> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut working = guard.clone();
        let value = f(&mut working)?;
        *guard = working;
        Ok(value)
    }
}
