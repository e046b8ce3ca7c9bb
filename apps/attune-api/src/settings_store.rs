use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::config::Config;

pub const DEFAULT_PROFILE: &str = "standard";

/// Saved widget preferences, keyed by `"{token}_{user_id}"` so that the
/// same local user id under two different site tokens never collides.
#[derive(Clone)]
pub struct SettingsStore {
    state: Arc<RwLock<SettingsState>>,
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SettingsState {
    settings: HashMap<String, SettingsRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    pub profile: String,
    pub custom_settings: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsStoreError {
    #[error("{message}")]
    Persistence { message: String },
}

fn settings_key(token: &str, user_id: &str) -> String {
    format!("{token}_{user_id}")
}

impl SettingsStore {
    pub fn from_config(config: &Config) -> Self {
        Self::at_path(config.settings_path())
    }

    pub fn at_path(path: Option<PathBuf>) -> Self {
        let loaded_state = load_state(path.as_deref());
        Self {
            state: Arc::new(RwLock::new(loaded_state)),
            path,
        }
    }

    /// Full-overwrite upsert; last write wins.
    pub async fn save(
        &self,
        token: &str,
        user_id: &str,
        profile: Option<String>,
        custom_settings: Option<Map<String, Value>>,
    ) -> Result<(), SettingsStoreError> {
        let record = SettingsRecord {
            profile: profile
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            custom_settings: custom_settings.unwrap_or_default(),
            updated_at: Utc::now(),
        };

        let snapshot = {
            let mut state = self.state.write().await;
            state.settings.insert(settings_key(token, user_id), record);
            state.clone()
        };
        self.persist(&snapshot).await?;

        tracing::debug!(target: "attune.settings", user_id, "saved settings");
        Ok(())
    }

    pub async fn load(&self, token: &str, user_id: &str) -> Option<SettingsRecord> {
        self.state
            .read()
            .await
            .settings
            .get(&settings_key(token, user_id))
            .cloned()
    }

    async fn persist(&self, state: &SettingsState) -> Result<(), SettingsStoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                SettingsStoreError::Persistence {
                    message: format!("failed to prepare settings store directory: {error}"),
                }
            })?;
        }

        let payload =
            serde_json::to_vec_pretty(state).map_err(|error| SettingsStoreError::Persistence {
                message: format!("failed to encode settings store payload: {error}"),
            })?;
        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

        tokio::fs::write(&temp_path, payload)
            .await
            .map_err(|error| SettingsStoreError::Persistence {
                message: format!("failed to write settings store payload: {error}"),
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|error| SettingsStoreError::Persistence {
                message: format!("failed to finalize settings store payload: {error}"),
            })?;

        Ok(())
    }
}

fn load_state(path: Option<&std::path::Path>) -> SettingsState {
    let Some(path) = path else {
        return SettingsState::default();
    };

    let raw = match std::fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return SettingsState::default();
        }
        Err(error) => {
            tracing::warn!(
                target: "attune.settings",
                path = %path.display(),
                error = %error,
                "failed to read settings store; booting with empty state",
            );
            return SettingsState::default();
        }
    };

    match serde_json::from_str::<SettingsState>(&raw) {
        Ok(state) => state,
        Err(error) => {
            tracing::warn!(
                target: "attune.settings",
                path = %path.display(),
                error = %error,
                "failed to parse settings store; booting with empty state",
            );
            SettingsState::default()
        }
    }
}
