use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::profile::ProfileId;
use crate::session::{ProfileSummary, SavedSettings, SettingsApi, TokenCheck, WidgetError};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

const TOKEN_HEADER: &str = "X-API-Token";

/// `SettingsApi` over HTTP. No retries and no explicit timeouts; a
/// failed call surfaces as a single error the session logs.
pub struct HttpSettingsApi {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct ProfilesResponse {
    profiles: Vec<ProfileSummary>,
}

impl HttpSettingsApi {
    /// `base_url` overrides the default local endpoint; a trailing
    /// slash is tolerated.
    pub fn new(base_url: Option<String>, token: impl Into<String>) -> Self {
        let base_url = base_url
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Self {
            base_url,
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn checked(
        &self,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<reqwest::Response, WidgetError> {
        let response = response.map_err(|error| WidgetError::Api {
            message: format!("request failed: {error}"),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ApiErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(WidgetError::TokenRejected { message })
        } else {
            Err(WidgetError::Api { message })
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, WidgetError> {
        response.json::<T>().await.map_err(|error| WidgetError::Api {
            message: format!("failed to decode response: {error}"),
        })
    }
}

#[async_trait]
impl SettingsApi for HttpSettingsApi {
    async fn validate_token(&self) -> Result<TokenCheck, WidgetError> {
        let response = self
            .http
            .get(self.url("/tokens/validate"))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await;
        Self::decode(self.checked(response).await?).await
    }

    async fn fetch_profiles(&self) -> Result<Vec<ProfileSummary>, WidgetError> {
        let response = self
            .http
            .get(self.url("/profiles"))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await;
        let body: ProfilesResponse = Self::decode(self.checked(response).await?).await?;
        Ok(body.profiles)
    }

    async fn load_settings(&self, user_id: &str) -> Result<SavedSettings, WidgetError> {
        let response = self
            .http
            .get(self.url("/settings/load"))
            .query(&[("userId", user_id)])
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await;
        Self::decode(self.checked(response).await?).await
    }

    async fn save_settings(
        &self,
        user_id: &str,
        profile: ProfileId,
        custom_settings: &Map<String, Value>,
    ) -> Result<(), WidgetError> {
        let response = self
            .http
            .post(self.url("/settings/save"))
            .header(TOKEN_HEADER, &self.token)
            .json(&json!({
                "userId": user_id,
                "profile": profile.as_str(),
                "customSettings": custom_settings,
            }))
            .send()
            .await;
        self.checked(response).await?;
        Ok(())
    }
}
