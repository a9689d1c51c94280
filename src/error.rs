//! Error types for range accounting and mutation.

use crate::types::{NetworkType, SegmentationId};
use uuid::Uuid;

/// Errors raised by the repository, service and type manager layers
#[derive(Debug, thiserror::Error)]
pub enum RangeError {
    #[error("Network segment range {range_id} could not be found")]
    NotFound { range_id: Uuid },

    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Network type {network_type} does not support network segment ranges")]
    NetworkTypeNotSupported { network_type: String },

    #[error("Network segment range {range_id} is a default segment range which could not be updated or deleted")]
    DefaultRangeReadOnly { range_id: Uuid },

    #[error("Network segment range {range_id} is referenced by one or more tenant networks")]
    RangeReferencedByProject { range_id: Uuid },

    #[error("network_type '{network_type}' unknown for getting allocation information")]
    UnsupportedNetworkType { network_type: NetworkType },

    #[error("No free {network_type} segmentation ID available{}", .physical_network.as_ref().map(|p| format!(" on {}", p)).unwrap_or_default())]
    PoolExhausted {
        network_type: NetworkType,
        physical_network: Option<String>,
    },

    #[error("{network_type} segmentation ID {segmentation_id} is already in use")]
    SegmentInUse {
        network_type: NetworkType,
        segmentation_id: SegmentationId,
    },

    #[error("Network segment {segment_id} could not be found")]
    SegmentNotFound { segment_id: Uuid },

    #[error("State file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl RangeError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        RangeError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = RangeError> = std::result::Result<T, E>;
