use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Load configuration, falling back to built-in defaults when the file is absent
pub fn load_config_or_default(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        load_config(config_path)
    } else {
        warn!(
            "Configuration file {:?} not found, using defaults (all type drivers, no static ranges)",
            config_path
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NetworkType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
general:
  log_level: info
  state_file: "/tmp/segrange_state.json"
type_drivers: [vlan, gre]
ranges:
  network_vlan_ranges: ["physnet1:100:200"]
  gre_id_ranges: ["1:500"]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.default_ranges().unwrap().len(), 2);
        assert!(config.enabled_types().unwrap().contains(&NetworkType::Gre));
    }

    #[test]
    fn test_load_invalid_config() {
        let yaml = r#"
type_drivers: [vlan]
ranges:
  network_vlan_ranges: ["physnet1:300:200"]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.enabled_types().unwrap().len(), 4);
        assert_eq!(config.general.log_level.as_deref(), Some("info"));
    }
}
