// Local settings: the user's id, API token and the team list cached at
// login. Stored as a small JSON file in the user's config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::api::{Identity, Team};
use crate::error::ApiError;

const APP_DIR: &str = "standup-cli";
const FILE_NAME: &str = "settings.json";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teams: Option<Vec<Team>>,
}

impl Settings {
    /// The signing identity, or `Unauthenticated` if either half is missing.
    pub fn identity(&self) -> Result<Identity, ApiError> {
        match (self.id, &self.token) {
            (Some(id), Some(token)) => Ok(Identity {
                id,
                secret: token.clone(),
            }),
            _ => Err(ApiError::Unauthenticated),
        }
    }

    /// Cached teams, empty before the first successful login.
    pub fn teams(&self) -> &[Team] {
        self.teams.as_deref().unwrap_or_default()
    }
}

/// Where settings live on disk.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store under the platform config directory, or the working
    /// directory when none is known.
    pub fn default_location() -> Self {
        let dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::at(dir.join(APP_DIR).join(FILE_NAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        SettingsStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read settings; a missing file yields empty settings.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no settings file yet");
            return Ok(Settings::default());
        }
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}
