use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::Config;

const TOKEN_PREFIX: &str = "attune_";
const TOKEN_ENTROPY_BYTES: usize = 32;
const DEFAULT_DOMAIN: &str = "localhost";
const DEFAULT_DESCRIPTION: &str = "New token";

/// Issued API tokens plus usage metadata. Tokens are never deleted,
/// only deactivated.
#[derive(Clone)]
pub struct TokenStore {
    state: Arc<RwLock<TokenState>>,
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct TokenState {
    tokens: Vec<TokenRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub token: String,
    pub domain: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub request_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("{message}")]
    Persistence { message: String },
}

fn generate_token_string() -> String {
    let mut entropy = [0u8; TOKEN_ENTROPY_BYTES];
    rand::rng().fill_bytes(&mut entropy);
    format!("{TOKEN_PREFIX}{}", hex::encode(entropy))
}

impl TokenStore {
    pub fn from_config(config: &Config) -> Self {
        Self::at_path(config.tokens_path())
    }

    pub fn at_path(path: Option<PathBuf>) -> Self {
        let loaded_state = load_state(path.as_deref());
        Self {
            state: Arc::new(RwLock::new(loaded_state)),
            path,
        }
    }

    /// Issue a new token. Empty or missing domain/description fall back
    /// to the defaults the widget onboarding flow expects.
    pub async fn generate(
        &self,
        domain: Option<String>,
        description: Option<String>,
    ) -> Result<TokenRecord, TokenStoreError> {
        let record = TokenRecord {
            token: generate_token_string(),
            domain: domain
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            description: description
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            active: true,
            created_at: Utc::now(),
            last_used: None,
            request_count: 0,
            deactivated_at: None,
        };

        let snapshot = {
            let mut state = self.state.write().await;
            state.tokens.push(record.clone());
            state.clone()
        };
        self.persist(&snapshot).await?;

        tracing::info!(
            target: "attune.tokens",
            domain = %record.domain,
            "issued api token",
        );
        Ok(record)
    }

    pub async fn list(&self) -> Vec<TokenRecord> {
        self.state.read().await.tokens.clone()
    }

    /// Look up an active token and record the use. Returns the updated
    /// record, or `None` when the token is unknown or inactive.
    pub async fn find_active_and_touch(
        &self,
        token: &str,
    ) -> Result<Option<TokenRecord>, TokenStoreError> {
        let (record, snapshot) = {
            let mut state = self.state.write().await;
            let Some(entry) = state
                .tokens
                .iter_mut()
                .find(|entry| entry.token == token && entry.active)
            else {
                return Ok(None);
            };
            entry.last_used = Some(Utc::now());
            entry.request_count += 1;
            (entry.clone(), state.clone())
        };
        self.persist(&snapshot).await?;
        Ok(Some(record))
    }

    /// Returns `false` when the token string is unknown.
    pub async fn deactivate(&self, token: &str) -> Result<bool, TokenStoreError> {
        let snapshot = {
            let mut state = self.state.write().await;
            let Some(entry) = state.tokens.iter_mut().find(|entry| entry.token == token) else {
                return Ok(false);
            };
            entry.active = false;
            entry.deactivated_at = Some(Utc::now());
            state.clone()
        };
        self.persist(&snapshot).await?;

        tracing::info!(target: "attune.tokens", "deactivated api token");
        Ok(true)
    }

    async fn persist(&self, state: &TokenState) -> Result<(), TokenStoreError> {
        persist_state(self.path.as_deref(), state).await
    }
}

fn load_state(path: Option<&std::path::Path>) -> TokenState {
    let Some(path) = path else {
        return TokenState::default();
    };

    let raw = match std::fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return TokenState::default();
        }
        Err(error) => {
            tracing::warn!(
                target: "attune.tokens",
                path = %path.display(),
                error = %error,
                "failed to read token store; booting with empty state",
            );
            return TokenState::default();
        }
    };

    match serde_json::from_str::<TokenState>(&raw) {
        Ok(state) => state,
        Err(error) => {
            tracing::warn!(
                target: "attune.tokens",
                path = %path.display(),
                error = %error,
                "failed to parse token store; booting with empty state",
            );
            TokenState::default()
        }
    }
}

async fn persist_state(
    path: Option<&std::path::Path>,
    state: &TokenState,
) -> Result<(), TokenStoreError> {
    let Some(path) = path else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|error| TokenStoreError::Persistence {
                message: format!("failed to prepare token store directory: {error}"),
            })?;
    }

    let payload = serde_json::to_vec_pretty(state).map_err(|error| TokenStoreError::Persistence {
        message: format!("failed to encode token store payload: {error}"),
    })?;
    let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

    tokio::fs::write(&temp_path, payload)
        .await
        .map_err(|error| TokenStoreError::Persistence {
            message: format!("failed to write token store payload: {error}"),
        })?;

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|error| TokenStoreError::Persistence {
            message: format!("failed to finalize token store payload: {error}"),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generated_tokens_are_distinct_and_prefixed() {
        let store = TokenStore::at_path(None);
        let first = store.generate(None, None).await.expect("generate first");
        let second = store.generate(None, None).await.expect("generate second");

        assert_ne!(first.token, second.token);
        assert!(first.token.starts_with(TOKEN_PREFIX));
        assert_eq!(first.token.len(), TOKEN_PREFIX.len() + TOKEN_ENTROPY_BYTES * 2);
        assert_eq!(first.domain, "localhost");
        assert_eq!(first.description, "New token");
        assert!(first.active);
        assert_eq!(first.request_count, 0);
        assert!(first.last_used.is_none());
    }

    #[tokio::test]
    async fn touch_updates_usage_counters() {
        let store = TokenStore::at_path(None);
        let issued = store
            .generate(Some("example.com".to_string()), None)
            .await
            .expect("generate");

        let touched = store
            .find_active_and_touch(&issued.token)
            .await
            .expect("touch")
            .expect("token present");
        assert_eq!(touched.request_count, 1);
        assert!(touched.last_used.is_some());

        let touched_again = store
            .find_active_and_touch(&issued.token)
            .await
            .expect("touch")
            .expect("token present");
        assert_eq!(touched_again.request_count, 2);
    }

    #[tokio::test]
    async fn deactivated_tokens_stop_validating_but_stay_listed() {
        let store = TokenStore::at_path(None);
        let issued = store.generate(None, None).await.expect("generate");

        assert!(store.deactivate(&issued.token).await.expect("deactivate"));
        assert!(
            store
                .find_active_and_touch(&issued.token)
                .await
                .expect("touch")
                .is_none()
        );

        let listed = store.list().await;
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].active);
        assert!(listed[0].deactivated_at.is_some());
    }

    #[tokio::test]
    async fn deactivating_unknown_token_reports_missing() {
        let store = TokenStore::at_path(None);
        assert!(!store.deactivate("attune_nope").await.expect("deactivate"));
    }

    #[tokio::test]
    async fn state_survives_reload_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokens.json");

        let store = TokenStore::at_path(Some(path.clone()));
        let issued = store.generate(None, None).await.expect("generate");
        store.deactivate(&issued.token).await.expect("deactivate");

        let reloaded = TokenStore::at_path(Some(path));
        let listed = reloaded.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].token, issued.token);
        assert!(!listed[0].active);
    }

    #[tokio::test]
    async fn unparsable_store_file_boots_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").expect("write");

        let store = TokenStore::at_path(Some(path));
        assert!(store.list().await.is_empty());
    }
}
