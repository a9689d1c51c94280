use crate::types::{NetworkType, SegmentationId};
use crate::validation::{BoundsValidator, SegmentationBounds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Host configuration for the segment range service
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    /// Network types whose type drivers are loaded
    #[serde(default = "default_type_drivers")]
    pub type_drivers: Vec<String>,
    /// Statically configured ranges, seeded as default ranges
    #[serde(default)]
    pub ranges: StaticRanges,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            type_drivers: default_type_drivers(),
            ranges: StaticRanges::default(),
        }
    }
}

fn default_type_drivers() -> Vec<String> {
    NetworkType::ALL.iter().map(|t| t.as_str().to_string()).collect()
}

/// General settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            state_file: Some("segrange_state.json".to_string()),
        }
    }
}

/// Range declarations in the classic `physnet:min:max` / `min:max` syntax
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StaticRanges {
    /// `physnet` or `physnet:min:max`
    #[serde(default)]
    pub network_vlan_ranges: Vec<String>,
    #[serde(default)]
    pub vxlan_vni_ranges: Vec<String>,
    #[serde(default)]
    pub gre_id_ranges: Vec<String>,
    #[serde(default)]
    pub geneve_vni_ranges: Vec<String>,
}

/// One parsed static range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredRange {
    pub network_type: NetworkType,
    pub physical_network: Option<String>,
    pub minimum: SegmentationId,
    pub maximum: SegmentationId,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(level) = &self.general.log_level {
            if level.trim().is_empty() {
                return Err(ValidationError::InvalidGeneral("log_level cannot be empty".to_string()));
            }
        }
        if let Some(state_file) = &self.general.state_file {
            if state_file.trim().is_empty() {
                return Err(ValidationError::InvalidGeneral("state_file cannot be empty".to_string()));
            }
        }

        let enabled = self.enabled_types()?;
        for range in self.default_ranges()? {
            if !enabled.contains(&range.network_type) {
                return Err(ValidationError::InvalidRange(format!(
                    "ranges declared for {} but its type driver is not enabled",
                    range.network_type
                )));
            }
        }
        Ok(())
    }

    /// Parse the enabled type drivers
    pub fn enabled_types(&self) -> Result<BTreeSet<NetworkType>, ValidationError> {
        self.type_drivers
            .iter()
            .map(|name| {
                name.parse::<NetworkType>()
                    .map_err(|e| ValidationError::InvalidTypeDriver(e.to_string()))
            })
            .collect()
    }

    /// Physical networks named in `network_vlan_ranges`, with or without a range
    pub fn physical_networks(&self) -> Result<Vec<String>, ValidationError> {
        let mut physnets = Vec::new();
        for entry in &self.ranges.network_vlan_ranges {
            let (physnet, _) = parse_vlan_entry(entry)?;
            if !physnets.contains(&physnet) {
                physnets.push(physnet);
            }
        }
        Ok(physnets)
    }

    /// Every statically configured range, in declaration order
    pub fn default_ranges(&self) -> Result<Vec<ConfiguredRange>, ValidationError> {
        let mut ranges = Vec::new();
        for entry in &self.ranges.network_vlan_ranges {
            if let (physnet, Some((minimum, maximum))) = parse_vlan_entry(entry)? {
                ranges.push(ConfiguredRange {
                    network_type: NetworkType::Vlan,
                    physical_network: Some(physnet),
                    minimum,
                    maximum,
                });
            }
        }

        let tunnels = [
            (NetworkType::Vxlan, &self.ranges.vxlan_vni_ranges),
            (NetworkType::Gre, &self.ranges.gre_id_ranges),
            (NetworkType::Geneve, &self.ranges.geneve_vni_ranges),
        ];
        for (network_type, entries) in tunnels {
            for entry in entries {
                let (minimum, maximum) = parse_bounds(entry, entry)?;
                ranges.push(ConfiguredRange {
                    network_type,
                    physical_network: None,
                    minimum,
                    maximum,
                });
            }
        }

        for range in &ranges {
            SegmentationBounds
                .verify_range(range.network_type, range.minimum, range.maximum)
                .map_err(|e| {
                    ValidationError::InvalidRange(format!(
                        "{} range {}:{}: {}",
                        range.network_type, range.minimum, range.maximum, e
                    ))
                })?;
        }
        Ok(ranges)
    }
}

fn parse_vlan_entry(entry: &str) -> Result<(String, Option<(SegmentationId, SegmentationId)>), ValidationError> {
    let entry = entry.trim();
    match entry.split_once(':') {
        None if !entry.is_empty() => Ok((entry.to_string(), None)),
        Some((physnet, bounds)) if !physnet.is_empty() => {
            Ok((physnet.to_string(), Some(parse_bounds(bounds, entry)?)))
        }
        _ => Err(ValidationError::InvalidRange(format!(
            "'{}' is not of the form <physical_network>[:<vlan_min>:<vlan_max>]",
            entry
        ))),
    }
}

fn parse_bounds(bounds: &str, entry: &str) -> Result<(SegmentationId, SegmentationId), ValidationError> {
    let malformed = || ValidationError::InvalidRange(format!("'{}' is not of the form <min>:<max>", entry));
    let (minimum, maximum) = bounds.trim().split_once(':').ok_or_else(malformed)?;
    let minimum = minimum.trim().parse().map_err(|_| malformed())?;
    let maximum = maximum.trim().parse().map_err(|_| malformed())?;
    Ok((minimum, maximum))
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid type driver: {0}")]
    InvalidTypeDriver(String),
    #[error("Invalid range configuration: {0}")]
    InvalidRange(String),
}
