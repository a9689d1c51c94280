//! Core data types for network segment ranges.
//!
//! This module contains the persisted range definition, the create and update
//! requests accepted by the service layer, and the response representation
//! that carries the live `available` and `used` allocation data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A numeric segmentation identifier (VLAN tag or tunnel ID)
pub type SegmentationId = u32;

/// Network types that can carry segment ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// 802.1Q VLAN, scoped by physical network
    Vlan,
    /// VXLAN tunnel
    Vxlan,
    /// GRE tunnel
    Gre,
    /// Geneve tunnel
    Geneve,
}

impl NetworkType {
    /// Every network type that supports segment ranges
    pub const ALL: [NetworkType; 4] = [
        NetworkType::Vlan,
        NetworkType::Vxlan,
        NetworkType::Gre,
        NetworkType::Geneve,
    ];

    /// Returns the wire name of the network type
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Vlan => "vlan",
            NetworkType::Vxlan => "vxlan",
            NetworkType::Gre => "gre",
            NetworkType::Geneve => "geneve",
        }
    }

    /// Whether ranges of this type are scoped to a physical network
    pub fn is_vlan(&self) -> bool {
        matches!(self, NetworkType::Vlan)
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a supported network type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network type '{0}'")]
pub struct UnknownNetworkType(pub String);

impl FromStr for NetworkType {
    type Err = UnknownNetworkType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vlan" => Ok(NetworkType::Vlan),
            "vxlan" => Ok(NetworkType::Vxlan),
            "gre" => Ok(NetworkType::Gre),
            "geneve" => Ok(NetworkType::Geneve),
            other => Err(UnknownNetworkType(other.to_string())),
        }
    }
}

/// Persisted definition of one network segment range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRecord {
    pub id: Uuid,
    pub name: Option<String>,
    /// Loaded from host configuration rather than created by an administrator
    pub default: bool,
    pub shared: bool,
    pub project_id: Option<String>,
    pub network_type: NetworkType,
    pub physical_network: Option<String>,
    pub minimum: SegmentationId,
    pub maximum: SegmentationId,
}

impl RangeRecord {
    /// Build a record, forcing `project_id` and `physical_network` to match
    /// `shared` and `network_type`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        name: Option<String>,
        default: bool,
        shared: bool,
        project_id: Option<String>,
        network_type: NetworkType,
        physical_network: Option<String>,
        minimum: SegmentationId,
        maximum: SegmentationId,
    ) -> Self {
        RangeRecord {
            id,
            name,
            default,
            shared,
            project_id: if shared { None } else { project_id },
            network_type,
            physical_network: if network_type.is_vlan() { physical_network } else { None },
            minimum,
            maximum,
        }
    }

    /// Check whether an identifier falls inside this range (bounds inclusive)
    pub fn contains(&self, segmentation_id: SegmentationId) -> bool {
        self.minimum <= segmentation_id && segmentation_id <= self.maximum
    }
}

/// Request to create a new range
///
/// `network_type` is kept as a string so that unknown types reach the
/// service layer and are reported as unsupported rather than as parse errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRange {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_shared")]
    pub shared: bool,
    #[serde(default)]
    pub project_id: Option<String>,
    pub network_type: String,
    #[serde(default)]
    pub physical_network: Option<String>,
    pub minimum: SegmentationId,
    pub maximum: SegmentationId,
}

fn default_shared() -> bool {
    true
}

/// Partial update of a range; unset fields keep their current values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<SegmentationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<SegmentationId>,
}

/// Live allocation state of a range, computed on every read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSnapshot {
    /// Identifiers free in the allocation pool, ascending
    pub available: Vec<SegmentationId>,
    /// Identifiers bound to live segments, mapped to the owning project
    pub used: BTreeMap<SegmentationId, String>,
}

/// Representation of a range returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeView {
    pub id: Uuid,
    pub name: Option<String>,
    pub default: bool,
    pub shared: bool,
    pub project_id: Option<String>,
    pub network_type: NetworkType,
    pub physical_network: Option<String>,
    pub minimum: SegmentationId,
    pub maximum: SegmentationId,
    pub available: Vec<SegmentationId>,
    pub used: BTreeMap<SegmentationId, String>,
}

impl RangeView {
    pub fn new(record: RangeRecord, snapshot: AllocationSnapshot) -> Self {
        RangeView {
            id: record.id,
            name: record.name,
            default: record.default,
            shared: record.shared,
            project_id: record.project_id,
            network_type: record.network_type,
            physical_network: record.physical_network,
            minimum: record.minimum,
            maximum: record.maximum,
            available: snapshot.available,
            used: snapshot.used,
        }
    }
}

/// A tenant network that owns live segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: Uuid,
    pub project_id: String,
}

/// A segmentation identifier bound to a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSegment {
    pub id: Uuid,
    pub network_id: Uuid,
    pub network_type: NetworkType,
    pub physical_network: Option<String>,
    pub segmentation_id: SegmentationId,
}

/// One row of a per-type allocation pool table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub segmentation_id: SegmentationId,
    pub allocated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_network: Option<String>,
}
