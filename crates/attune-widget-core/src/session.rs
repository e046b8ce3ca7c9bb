use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::document::DocumentSurface;
use crate::highlight::apply_keyword_highlighting;
use crate::profile::{MARKER_CLASSES, ProfileId, WIDGET_STYLESHEET};

const USER_ID_STORAGE_KEY: &str = "attune_user_id";
const USER_ID_PREFIX: &str = "user_";
const USER_ID_LENGTH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    #[error("token rejected: {message}")]
    TokenRejected { message: String },
    #[error("api request failed: {message}")]
    Api { message: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenCheck {
    pub valid: bool,
    pub domain: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub features: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSettings {
    pub profile: String,
    #[serde(default)]
    pub custom_settings: Map<String, Value>,
}

/// The widget's view of the settings API. Implemented over HTTP for
/// real hosts and by in-memory fakes in tests.
#[async_trait]
pub trait SettingsApi: Send + Sync {
    async fn validate_token(&self) -> Result<TokenCheck, WidgetError>;
    async fn fetch_profiles(&self) -> Result<Vec<ProfileSummary>, WidgetError>;
    async fn load_settings(&self, user_id: &str) -> Result<SavedSettings, WidgetError>;
    async fn save_settings(
        &self,
        user_id: &str,
        profile: ProfileId,
        custom_settings: &Map<String, Value>,
    ) -> Result<(), WidgetError>;
}

/// Host-provided persistent key/value storage (browser local storage
/// in the embed; a map in tests). Holds the stable local user id.
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Validating,
    Failed,
    Ready,
}

/// One rendered profile card: catalog entry plus selection state. The
/// host paints `active` as the visual highlight and `pressed` as the
/// aria-pressed attribute.
#[derive(Debug, Clone)]
pub struct ProfileCard {
    pub profile: ProfileId,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub pressed: bool,
}

/// Widget state for one embedded page: phase, panel visibility, the
/// active profile, and the rendered cards. All state lives here rather
/// than in globals so a host can run several sessions side by side.
pub struct WidgetSession {
    api: Arc<dyn SettingsApi>,
    user_id: String,
    phase: SessionPhase,
    panel_open: bool,
    current_profile: ProfileId,
    custom_settings: Map<String, Value>,
    cards: Vec<ProfileCard>,
    site_domain: Option<String>,
}

/// Return the stored local user id, minting and persisting one on
/// first use.
pub fn resolve_user_id(storage: &mut dyn KeyValueStorage) -> String {
    if let Some(existing) = storage.get(USER_ID_STORAGE_KEY) {
        return existing;
    }

    let mut rng = rand::rng();
    let suffix: String = (0..USER_ID_LENGTH)
        .map(|_| {
            let alphabet = b"abcdefghijklmnopqrstuvwxyz0123456789";
            alphabet[rng.random_range(0..alphabet.len())] as char
        })
        .collect();
    let user_id = format!("{USER_ID_PREFIX}{suffix}");
    storage.set(USER_ID_STORAGE_KEY, &user_id);
    user_id
}

impl WidgetSession {
    pub fn new(api: Arc<dyn SettingsApi>, storage: &mut dyn KeyValueStorage) -> Self {
        Self {
            api,
            user_id: resolve_user_id(storage),
            phase: SessionPhase::Uninitialized,
            panel_open: false,
            current_profile: ProfileId::Standard,
            custom_settings: Map::new(),
            cards: Vec::new(),
            site_domain: None,
        }
    }

    /// Init sequence: validate the token (failure leaves the widget
    /// unrendered), inject the stylesheet, build the profile cards,
    /// then apply any saved profile.
    pub async fn initialize(
        &mut self,
        document: &mut dyn DocumentSurface,
    ) -> Result<(), WidgetError> {
        self.phase = SessionPhase::Validating;

        let validation = self.api.validate_token().await;
        let check = match validation {
            Ok(check) if check.valid => check,
            Ok(_) => {
                self.phase = SessionPhase::Failed;
                tracing::error!(target: "attune.widget", "api token reported invalid");
                return Err(WidgetError::TokenRejected {
                    message: "token reported invalid".to_string(),
                });
            }
            Err(error) => {
                self.phase = SessionPhase::Failed;
                tracing::error!(target: "attune.widget", error = %error, "api token validation failed");
                return Err(error);
            }
        };
        self.site_domain = Some(check.domain);

        document.inject_stylesheet(WIDGET_STYLESHEET);

        let catalog = self.api.fetch_profiles().await;
        match catalog {
            Ok(profiles) => self.render_cards(&profiles),
            Err(error) => {
                tracing::warn!(target: "attune.widget", error = %error, "failed to load profile catalog");
            }
        }

        let saved = self.api.load_settings(&self.user_id).await;
        match saved {
            Ok(saved) => {
                self.custom_settings = saved.custom_settings.clone();
                let profile = ProfileId::from_saved(&saved.profile);
                self.activate_profile(document, profile).await;
            }
            Err(error) => {
                tracing::warn!(target: "attune.widget", error = %error, "failed to load saved settings");
            }
        }

        self.phase = SessionPhase::Ready;
        Ok(())
    }

    /// Clear every marker class, apply the new profile's classes, run
    /// the keyword pass for adhd, update the cards, and persist. A
    /// failed save logs and leaves the applied state in place.
    pub async fn activate_profile(
        &mut self,
        document: &mut dyn DocumentSurface,
        profile: ProfileId,
    ) {
        for class in MARKER_CLASSES {
            document.remove_body_class(class);
        }
        for class in profile.body_classes() {
            document.add_body_class(class);
        }
        if profile == ProfileId::Adhd {
            apply_keyword_highlighting(document);
        }

        self.current_profile = profile;
        for card in &mut self.cards {
            let selected = card.profile == profile;
            card.active = selected;
            card.pressed = selected;
        }

        self.save_settings().await;
    }

    /// Push the current selection to the backend. Failures are logged
    /// and do not roll back the UI.
    pub async fn save_settings(&self) {
        if let Err(error) = self
            .api
            .save_settings(&self.user_id, self.current_profile, &self.custom_settings)
            .await
        {
            tracing::warn!(target: "attune.widget", error = %error, "failed to save settings");
        }
    }

    /// Re-fetch saved settings and apply them.
    pub async fn load_settings(&mut self, document: &mut dyn DocumentSurface) {
        let saved = self.api.load_settings(&self.user_id).await;
        match saved {
            Ok(saved) => {
                self.custom_settings = saved.custom_settings.clone();
                let profile = ProfileId::from_saved(&saved.profile);
                self.activate_profile(document, profile).await;
            }
            Err(error) => {
                tracing::warn!(target: "attune.widget", error = %error, "failed to load saved settings");
            }
        }
    }

    pub fn toggle_panel(&mut self) -> bool {
        self.panel_open = !self.panel_open;
        self.panel_open
    }

    fn render_cards(&mut self, profiles: &[ProfileSummary]) {
        self.cards = profiles
            .iter()
            .map(|summary| {
                let profile = ProfileId::from_saved(&summary.id);
                ProfileCard {
                    profile,
                    name: summary.name.clone(),
                    description: summary.description.clone(),
                    active: profile == self.current_profile,
                    pressed: profile == self.current_profile,
                }
            })
            .collect();
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn current_profile(&self) -> ProfileId {
        self.current_profile
    }

    pub fn custom_settings(&self) -> &Map<String, Value> {
        &self.custom_settings
    }

    pub fn cards(&self) -> &[ProfileCard] {
        &self.cards
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn site_domain(&self) -> Option<&str> {
        self.site_domain.as_deref()
    }
}
