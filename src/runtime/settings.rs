use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::plugin::RepositoryInfo;

use super::{AppError, Result};

pub const DEFAULT_HISTORY_SIZE: usize = 50;

/// Application settings, read from a JSON or YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub history_size: usize,
    pub sequence_persistence: bool,
    pub persistence_dir: Option<PathBuf>,
    pub auto_update_channel_bounds: bool,
    pub kernel_version: String,
    pub allow_beta: bool,
    pub repositories: Vec<RepositoryInfo>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            sequence_persistence: false,
            persistence_dir: None,
            auto_update_channel_bounds: true,
            kernel_version: env!("CARGO_PKG_VERSION").to_string(),
            allow_beta: false,
            repositories: Vec::new(),
        }
    }
}

pub const REDACTED: &str = "********";

impl Settings {
    /// Copy safe to display: repository passwords are masked.
    pub fn redacted(&self) -> Settings {
        let mut settings = self.clone();
        for auth in settings
            .repositories
            .iter_mut()
            .filter_map(|repository| repository.authentication.as_mut())
        {
            if !auth.password.is_empty() {
                auth.password = REDACTED.to_string();
            }
        }
        settings
    }

    pub fn validate(&self) -> Result<()> {
        if self.sequence_persistence && self.persistence_dir.is_none() {
            return Err(AppError::Config(
                "sequence_persistence requires persistence_dir".to_string(),
            ));
        }
        if self.kernel_version.trim().is_empty() {
            return Err(AppError::Config("kernel_version is empty".to_string()));
        }
        for repository in &self.repositories {
            if repository.location.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "repository '{}' has no location",
                    repository.name
                )));
            }
        }
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    matches!(extension.as_str(), "yaml" | "yml")
}

pub fn load_settings(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    let settings = if is_yaml(path) {
        serde_yaml::from_str::<Settings>(&raw)?
    } else {
        serde_json::from_str::<Settings>(&raw)?
    };
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: impl AsRef<Path>, settings: &Settings) -> Result<()> {
    let path = path.as_ref();
    let serialized = if is_yaml(path) {
        serde_yaml::to_string(settings)?
    } else {
        serde_json::to_string_pretty(settings)?
    };
    fs::write(path, serialized)?;
    Ok(())
}
