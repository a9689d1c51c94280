//! # segment-ranges - Network segment range accounting
//!
//! This library manages administrator-defined ranges of segmentation
//! identifiers (VLAN tags and VXLAN, GRE or Geneve tunnel ids) that tenant
//! networks draw their segments from.
//!
//! ## Overview
//!
//! A network segment range is a named, optionally project-owned slice of a
//! network type's identifier space. Every read of a range reports live
//! allocation state next to the stored record:
//!
//! - `available`: identifiers still free in the type's allocation pool
//! - `used`: identifiers bound to live segments, mapped to the owning project
//!
//! Mutations are guarded so that a range can never be shrunk or removed from
//! under live segments, and ranges seeded from host configuration stay
//! read-only.
//!
//! ## Architecture
//!
//! - `types`: range records, requests and the produced representation
//! - `validation`: identifier space bounds per network type
//! - `store`: in-memory transactional datastore with a JSON state file
//! - `oracle`: per-type pool lookup computing `available` and `used`
//! - `repository`: range persistence, validation and listing
//! - `service`: mutation safety rules and the post-commit recompute hook
//! - `type_manager`: enabled types, live usage queries and pool maintenance
//! - `config` / `config_loader`: YAML host configuration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use segment_ranges::{CreateRange, Datastore, RangeRepository, RangeService, SegmentTypeManager};
//! use segment_ranges::types::NetworkType;
//! use std::sync::Arc;
//!
//! let db = Arc::new(Datastore::new());
//! let manager = Arc::new(SegmentTypeManager::with_types(db.clone(), NetworkType::ALL));
//! let service = RangeService::new(db, RangeRepository::default(), manager);
//!
//! let range = service.create(&CreateRange {
//!     name: Some("tenant-vxlan".to_string()),
//!     shared: true,
//!     project_id: None,
//!     network_type: "vxlan".to_string(),
//!     physical_network: None,
//!     minimum: 1000,
//!     maximum: 1999,
//! })?;
//! println!("{} free identifiers", service.get(range.id)?.available.len());
//! # Ok::<(), segment_ranges::RangeError>(())
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`RangeError`]; configuration problems are
//! reported as [`config::ValidationError`]. The `segrange` binary wraps both
//! with `color_eyre` for context.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod oracle;
pub mod repository;
pub mod service;
pub mod store;
pub mod type_manager;
pub mod types;
pub mod validation;

pub use error::{RangeError, Result};
pub use repository::RangeRepository;
pub use service::RangeService;
pub use store::Datastore;
pub use type_manager::{SegmentTypeManager, TypeManager};
pub use types::{CreateRange, RangeView, UpdateRange};
