//! Global Configuration (~/.refprune/config.toml)
//!
//! Handles user-level configuration stored in `~/.refprune/config.toml`,
//! typically the machine's builder location.

use crate::project::{BuilderConfig, LogConfig, PackagesConfig, ProjectConfig};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.refprune/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Build tool settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderConfig>,

    /// Package manifest defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages: Option<PackagesConfig>,

    /// Build log settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.settings().validate()
    }

    /// The global settings as a base layer for project configuration
    pub fn settings(&self) -> ProjectConfig {
        ProjectConfig {
            builder: self.builder.clone(),
            packages: self.packages.clone(),
            log: self.log.clone(),
        }
    }

    /// Get the global configuration directory (~/.refprune)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".refprune"))
    }

    /// Get the global config file path (~/.refprune/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        Ok(Self::global_config_dir()?.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_config() {
        let toml = r#"
[builder]
candidates = [
    "C:/Program Files (x86)/MSBuild/14.0/Bin/MSBuild.exe",
    "C:/Windows/Microsoft.NET/Framework64/v4.0.30319/MSBuild.exe",
]
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.builder.unwrap().candidates.len(), 2);
    }

    #[test]
    fn test_invalid_global_config_rejected() {
        let config = GlobalConfig {
            packages: Some(PackagesConfig {
                prune: Some(true),
                manifest: Some(String::new()),
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_global_config_path_under_home() {
        if let Ok(path) = GlobalConfig::global_config_path() {
            assert!(path.ends_with(".refprune/config.toml"));
        }
    }
}
