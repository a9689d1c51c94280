//! Segmentation ID bounds validation.
//!
//! Checks that a range's bounds lie inside the numeric space of its network
//! type and that the minimum does not exceed the maximum. The service layer
//! only talks to the [`BoundsValidator`] trait; [`SegmentationBounds`] is the
//! stock implementation.

use crate::error::{RangeError, Result};
use crate::types::{NetworkType, SegmentationId};

pub const MIN_VLAN_TAG: SegmentationId = 1;
pub const MAX_VLAN_TAG: SegmentationId = 4094;
pub const MIN_VXLAN_VNI: SegmentationId = 1;
pub const MAX_VXLAN_VNI: SegmentationId = (1 << 24) - 1;
pub const MIN_GENEVE_VNI: SegmentationId = 1;
pub const MAX_GENEVE_VNI: SegmentationId = (1 << 24) - 1;
pub const MIN_GRE_ID: SegmentationId = 1;
pub const MAX_GRE_ID: SegmentationId = u32::MAX;

/// Valid identifier space `(min, max)` for a network type
pub fn id_space(network_type: NetworkType) -> (SegmentationId, SegmentationId) {
    match network_type {
        NetworkType::Vlan => (MIN_VLAN_TAG, MAX_VLAN_TAG),
        NetworkType::Vxlan => (MIN_VXLAN_VNI, MAX_VXLAN_VNI),
        NetworkType::Gre => (MIN_GRE_ID, MAX_GRE_ID),
        NetworkType::Geneve => (MIN_GENEVE_VNI, MAX_GENEVE_VNI),
    }
}

/// Numeric range checks applied before a range is persisted
pub trait BoundsValidator: Send + Sync {
    /// Validate VLAN tag bounds
    fn verify_vlan_range(&self, minimum: SegmentationId, maximum: SegmentationId) -> Result<()>;

    /// Validate tunnel ID bounds for the given tunnel type
    fn verify_tunnel_range(
        &self,
        minimum: SegmentationId,
        maximum: SegmentationId,
        network_type: NetworkType,
    ) -> Result<()>;

    /// Dispatch to the VLAN or tunnel check
    fn verify_range(
        &self,
        network_type: NetworkType,
        minimum: SegmentationId,
        maximum: SegmentationId,
    ) -> Result<()> {
        if network_type.is_vlan() {
            self.verify_vlan_range(minimum, maximum)
        } else {
            self.verify_tunnel_range(minimum, maximum, network_type)
        }
    }
}

/// Validator enforcing the standard identifier spaces
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentationBounds;

impl BoundsValidator for SegmentationBounds {
    fn verify_vlan_range(&self, minimum: SegmentationId, maximum: SegmentationId) -> Result<()> {
        for (field, tag) in [("minimum", minimum), ("maximum", maximum)] {
            if !(MIN_VLAN_TAG..=MAX_VLAN_TAG).contains(&tag) {
                return Err(RangeError::invalid(field, format!("{} is not a valid VLAN tag", tag)));
            }
        }
        if maximum < minimum {
            return Err(RangeError::invalid(
                "maximum",
                "End of VLAN range is less than start of VLAN range",
            ));
        }
        Ok(())
    }

    fn verify_tunnel_range(
        &self,
        minimum: SegmentationId,
        maximum: SegmentationId,
        network_type: NetworkType,
    ) -> Result<()> {
        let (low, high) = id_space(network_type);
        for (field, id) in [("minimum", minimum), ("maximum", maximum)] {
            if !(low..=high).contains(&id) {
                return Err(RangeError::invalid(
                    field,
                    format!("{} is not a valid {} identifier", id, network_type),
                ));
            }
        }
        if maximum < minimum {
            return Err(RangeError::invalid(
                "maximum",
                "End of tunnel range is less than start of tunnel range",
            ));
        }
        Ok(())
    }
}
