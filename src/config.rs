// src/config.rs
//! SMS account configuration and its JSON persistence.

use anyhow::{anyhow, Result};
use log::{info, warn};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::models::{Entity, User};

/// Account id used when no account file exists yet
pub const DEFAULT_ACCOUNT_ID: &str = "sms";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmsConfiguration {
    /// Abort the received-SMS broadcast after handling it so that other
    /// receivers (the stock messaging app included) never see it
    #[serde(default)]
    pub stop_further_processing: bool,
}

/// The signed-in SMS account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsAccount {
    pub id: String,
    pub user: User,
    #[serde(default)]
    pub configuration: SmsConfiguration,
}

impl SmsAccount {
    pub fn new(id: &str, user: User, configuration: SmsConfiguration) -> Self {
        SmsAccount {
            id: id.to_string(),
            user,
            configuration,
        }
    }

    /// Account owned by a fresh "me" user
    pub fn with_default_user(id: &str) -> Self {
        let mut user = User::new(Entity::new(id, "me"));
        user.first_name = "Me".to_string();
        SmsAccount::new(id, user, SmsConfiguration::default())
    }
}

static CONFIG_DIR_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Use `dir` instead of the platform config directory for the rest of the
/// process. The override can be set once; setting another directory later fails.
pub fn set_config_dir_override(dir: PathBuf) -> Result<()> {
    match CONFIG_DIR_OVERRIDE.try_insert(dir) {
        Ok(_) => Ok(()),
        Err((current, dir)) if *current == dir => Ok(()),
        Err((current, dir)) => {
            warn!(
                "Config directory already set to {}, ignoring {}",
                current.display(),
                dir.display()
            );
            Err(anyhow!("Config directory override already set to {}", current.display()))
        }
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = match CONFIG_DIR_OVERRIDE.get() {
        Some(dir) => dir.clone(),
        None => dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?
            .join("messenger-sms"),
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn default_account_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("account.json"))
}

pub fn save_account(path: &Path, account: &SmsAccount) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, account)?;

    info!("Account {} saved to {}", account.id, path.display());
    Ok(())
}

/// Load the account stored at `path`; a missing file is not an error
pub fn load_account(path: &Path) -> Result<Option<SmsAccount>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)?;
    let account: SmsAccount = serde_json::from_str(&contents)
        .map_err(|e| anyhow!("Invalid account file {}: {}", path.display(), e))?;
    info!("Loaded account {} from {}", account.id, path.display());

    Ok(Some(account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_account_round_trip() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("account.json");

        let mut account = SmsAccount::with_default_user("sms");
        account.configuration.stop_further_processing = true;
        save_account(&path, &account)?;

        let loaded = load_account(&path)?.expect("account should load");
        assert_eq!(loaded, account);
        Ok(())
    }

    #[test]
    fn test_missing_account_file() -> Result<()> {
        let temp_dir = tempdir()?;
        assert!(load_account(&temp_dir.path().join("absent.json"))?.is_none());
        Ok(())
    }

    #[test]
    fn test_configuration_defaults() -> Result<()> {
        let account: SmsAccount = serde_json::from_str(
            r#"{"id": "sms", "user": {"entity": {"account_id": "sms", "local_id": "me"}}}"#,
        )?;
        assert!(!account.configuration.stop_further_processing);
        assert_eq!(account.user.display_name(), "me");
        Ok(())
    }

    #[test]
    fn test_invalid_account_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("account.json");
        fs::write(&path, "{ not json")?;
        assert!(load_account(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_config_dir_override() -> Result<()> {
        let temp_dir = tempdir()?;
        let dir = temp_dir.path().join("nested");
        set_config_dir_override(dir.clone())?;

        // Created on first use
        assert_eq!(default_account_path()?, dir.join("account.json"));
        assert!(dir.is_dir());

        // Same directory again is fine, a different one is refused
        set_config_dir_override(dir.clone())?;
        assert!(set_config_dir_override(temp_dir.path().join("other")).is_err());
        assert_eq!(get_config_dir()?, dir);
        Ok(())
    }
}
