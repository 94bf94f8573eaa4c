use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::{CliError, Result};

/// Per-user defaults for netsells-cli
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    /// AWS region used when neither a flag, env var nor project file sets one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// AWS CLI/SDK profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// AWS account hosting the ECR registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

/// Keys accepted by `config set` / `config unset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SettingKey {
    Region,
    Profile,
    AccountId,
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingKey::Region => write!(f, "region"),
            SettingKey::Profile => write!(f, "profile"),
            SettingKey::AccountId => write!(f, "account-id"),
        }
    }
}

impl Settings {
    /// Get the path to the config file
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "netsells-cli")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load settings from the config file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()
            .ok_or_else(|| CliError::Config("Cannot determine config directory".to_string()))?;

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let settings: Settings = serde_json::from_str(&content).map_err(|e| {
            CliError::Config(format!("Failed to parse config file: {}", e))
        })?;

        Ok(settings)
    }

    /// Save settings to the config file with restricted permissions (0600)
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| CliError::Config("Cannot determine config directory".to_string()))?;

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;

        // Write with restricted permissions (owner read/write only)
        #[cfg(unix)]
        {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)?;
            file.write_all(content.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&path, content)?;
        }

        Ok(())
    }

    pub fn get(&self, key: SettingKey) -> Option<&str> {
        match key {
            SettingKey::Region => self.region.as_deref(),
            SettingKey::Profile => self.profile.as_deref(),
            SettingKey::AccountId => self.account_id.as_deref(),
        }
    }

    /// Set a value (validated for its key)
    pub fn set(&mut self, key: SettingKey, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            SettingKey::Region => {
                Self::validate_region(value)?;
                self.region = Some(value.to_string());
            }
            SettingKey::Profile => {
                if value.is_empty() {
                    return Err(CliError::Config("Profile cannot be empty".to_string()));
                }
                self.profile = Some(value.to_string());
            }
            SettingKey::AccountId => {
                Self::validate_account_id(value)?;
                self.account_id = Some(value.to_string());
            }
        }
        Ok(())
    }

    /// Clear a value, returning what was there
    pub fn unset(&mut self, key: SettingKey) -> Option<String> {
        match key {
            SettingKey::Region => self.region.take(),
            SettingKey::Profile => self.profile.take(),
            SettingKey::AccountId => self.account_id.take(),
        }
    }

    /// Validate AWS region format (e.g., us-east-1, eu-west-2)
    pub fn validate_region(region: &str) -> Result<()> {
        // Regions look like "us-east-1", "eu-west-2", "ap-southeast-1"
        let parts: Vec<&str> = region.split('-').collect();
        if parts.len() < 3 {
            return Err(CliError::Config(format!(
                "Invalid AWS region format: '{}'. Expected format like 'eu-west-2'",
                region
            )));
        }
        // Check that the last part is a number
        if parts.last().map(|p| p.parse::<u32>().is_err()).unwrap_or(true) {
            return Err(CliError::Config(format!(
                "Invalid AWS region format: '{}'. Expected format like 'eu-west-2'",
                region
            )));
        }
        Ok(())
    }

    /// Validate an AWS account ID (12 digits)
    pub fn validate_account_id(account_id: &str) -> Result<()> {
        if account_id.len() != 12 || !account_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(CliError::Config(format!(
                "Invalid AWS account ID: '{}'. Expected 12 digits",
                account_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_region() {
        assert!(Settings::validate_region("eu-west-2").is_ok());
        assert!(Settings::validate_region("ap-southeast-1").is_ok());
        assert!(Settings::validate_region("us-gov-east-1").is_ok());
        assert!(Settings::validate_region("europe").is_err());
        assert!(Settings::validate_region("eu-west-two").is_err());
    }

    #[test]
    fn test_validate_account_id() {
        assert!(Settings::validate_account_id("422860057079").is_ok());
        assert!(Settings::validate_account_id("42286005707").is_err());
        assert!(Settings::validate_account_id("42286005707a").is_err());
    }

    #[test]
    fn test_set_and_unset() {
        let mut settings = Settings::default();
        settings.set(SettingKey::Region, " eu-west-1 ").unwrap();
        settings.set(SettingKey::Profile, "agency").unwrap();
        assert_eq!(settings.get(SettingKey::Region), Some("eu-west-1"));
        assert_eq!(settings.get(SettingKey::Profile), Some("agency"));

        assert!(settings.set(SettingKey::AccountId, "nope").is_err());
        assert_eq!(settings.get(SettingKey::AccountId), None);

        assert_eq!(settings.unset(SettingKey::Profile), Some("agency".to_string()));
        assert_eq!(settings.get(SettingKey::Profile), None);
    }

    #[test]
    fn test_serialization_skips_unset_values() {
        let mut settings = Settings::default();
        settings.set(SettingKey::Region, "eu-west-2").unwrap();
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"region":"eu-west-2"}"#);

        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
