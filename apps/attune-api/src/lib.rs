use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod api_envelope;
pub mod config;
pub mod profiles;
pub mod settings_store;
pub mod token_store;

use crate::api_envelope::{
    ApiErrorTuple, bad_request_error, forbidden_error, internal_error, not_found_error,
    unauthorized_error,
};
use crate::config::Config;
use crate::profiles::{ProfileDefinition, profile_catalog};
use crate::settings_store::{DEFAULT_PROFILE, SettingsRecord, SettingsStore};
use crate::token_store::{TokenRecord, TokenStore};

const SERVICE_NAME: &str = "attune-api";
const TOKEN_HEADER: &str = "x-api-token";

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    tokens: TokenStore,
    settings: SettingsStore,
}

pub fn build_router(config: Config) -> Router {
    let tokens = TokenStore::from_config(&config);
    let settings = SettingsStore::from_config(&config);
    let state = AppState {
        config: Arc::new(config),
        tokens,
        settings,
    };
    let token_gate_state = state.clone();

    let widget_api_router = Router::new()
        .route("/api/tokens/validate", get(validate_token))
        .route("/api/settings/save", post(save_settings))
        .route("/api/settings/load", get(load_settings))
        .route("/api/profiles", get(list_profiles))
        .route_layer(middleware::from_fn_with_state(token_gate_state, token_gate));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/readyz", get(readiness))
        .route("/api/tokens/generate", post(generate_token))
        .route("/api/tokens/list", get(list_tokens))
        .route("/api/tokens/deactivate", post(deactivate_token))
        .merge(widget_api_router)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http()),
        )
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    service: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ReadinessResponse {
    status: &'static str,
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let usable = match state.config.data_dir.as_ref() {
        None => true,
        Some(dir) => tokio::fs::create_dir_all(dir).await.is_ok(),
    };

    if usable {
        (StatusCode::OK, Json(ReadinessResponse { status: "ready" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
            }),
        )
    }
}

/// Shared precondition for the widget-facing routes: the request must
/// carry a known, active token via the `X-API-Token` header or the
/// `token` query parameter. The matching record (with usage counters
/// already bumped) is attached to the request for the handler.
async fn token_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| query_param(request.uri().query(), "token"));

    let Some(token) = token.filter(|value| !value.is_empty()) else {
        return unauthorized_error("API token required").into_response();
    };

    match state.tokens.find_active_and_touch(&token).await {
        Ok(Some(record)) => {
            request.extensions_mut().insert(record);
            next.run(request).await
        }
        Ok(None) => forbidden_error("Invalid or inactive token").into_response(),
        Err(error) => {
            tracing::error!(target: "attune.api", error = %error, "token validation failed");
            internal_error("Token validation failed").into_response()
        }
    }
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn require_admin(state: &AppState, admin_key: Option<&str>) -> Result<(), ApiErrorTuple> {
    if admin_key == Some(state.config.admin_key.as_str()) {
        Ok(())
    } else {
        Err(unauthorized_error("Unauthorized"))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateTokenRequest {
    domain: Option<String>,
    description: Option<String>,
    admin_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateTokenResponse {
    success: bool,
    token: String,
    message: &'static str,
    token_data: TokenRecord,
}

async fn generate_token(
    State(state): State<AppState>,
    Json(body): Json<GenerateTokenRequest>,
) -> Result<Json<GenerateTokenResponse>, ApiErrorTuple> {
    require_admin(&state, body.admin_key.as_deref())?;

    let record = state
        .tokens
        .generate(body.domain, body.description)
        .await
        .map_err(|error| {
            tracing::error!(target: "attune.api", error = %error, "token generation failed");
            internal_error("Failed to generate token")
        })?;

    Ok(Json(GenerateTokenResponse {
        success: true,
        token: record.token.clone(),
        message: "Token generated successfully",
        token_data: record,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminKeyQuery {
    admin_key: Option<String>,
}

#[derive(Serialize)]
struct TokenListResponse {
    tokens: Vec<TokenRecord>,
}

async fn list_tokens(
    State(state): State<AppState>,
    Query(query): Query<AdminKeyQuery>,
) -> Result<Json<TokenListResponse>, ApiErrorTuple> {
    require_admin(&state, query.admin_key.as_deref())?;

    Ok(Json(TokenListResponse {
        tokens: state.tokens.list().await,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeactivateTokenRequest {
    token: Option<String>,
    admin_key: Option<String>,
}

#[derive(Serialize)]
struct AckResponse {
    success: bool,
    message: &'static str,
}

async fn deactivate_token(
    State(state): State<AppState>,
    Json(body): Json<DeactivateTokenRequest>,
) -> Result<Json<AckResponse>, ApiErrorTuple> {
    require_admin(&state, body.admin_key.as_deref())?;

    let token = body.token.unwrap_or_default();
    let found = state.tokens.deactivate(&token).await.map_err(|error| {
        tracing::error!(target: "attune.api", error = %error, "token deactivation failed");
        internal_error("Failed to deactivate token")
    })?;

    if !found {
        return Err(not_found_error("Token not found"));
    }

    Ok(Json(AckResponse {
        success: true,
        message: "Token deactivated",
    }))
}

#[derive(Serialize)]
struct ValidateResponse {
    valid: bool,
    domain: String,
    message: &'static str,
}

async fn validate_token(Extension(token): Extension<TokenRecord>) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        valid: true,
        domain: token.domain,
        message: "Token is valid",
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveSettingsRequest {
    user_id: Option<String>,
    profile: Option<String>,
    custom_settings: Option<Map<String, Value>>,
}

async fn save_settings(
    State(state): State<AppState>,
    Extension(token): Extension<TokenRecord>,
    Json(body): Json<SaveSettingsRequest>,
) -> Result<Json<AckResponse>, ApiErrorTuple> {
    let user_id = body
        .user_id
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| bad_request_error("userId required"))?;

    state
        .settings
        .save(&token.token, &user_id, body.profile, body.custom_settings)
        .await
        .map_err(|error| {
            tracing::error!(target: "attune.api", error = %error, "settings save failed");
            internal_error("Failed to save settings")
        })?;

    Ok(Json(AckResponse {
        success: true,
        message: "Settings saved successfully",
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadSettingsQuery {
    user_id: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum LoadSettingsResponse {
    Saved(SettingsRecord),
    #[serde(rename_all = "camelCase")]
    Default {
        profile: &'static str,
        custom_settings: Map<String, Value>,
        message: &'static str,
    },
}

async fn load_settings(
    State(state): State<AppState>,
    Extension(token): Extension<TokenRecord>,
    Query(query): Query<LoadSettingsQuery>,
) -> Result<Json<LoadSettingsResponse>, ApiErrorTuple> {
    let user_id = query
        .user_id
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| bad_request_error("userId required"))?;

    let response = match state.settings.load(&token.token, &user_id).await {
        Some(record) => LoadSettingsResponse::Saved(record),
        None => LoadSettingsResponse::Default {
            profile: DEFAULT_PROFILE,
            custom_settings: Map::new(),
            message: "No saved settings found",
        },
    };

    Ok(Json(response))
}

#[derive(Serialize)]
struct ProfileCatalogResponse {
    profiles: &'static [ProfileDefinition],
}

async fn list_profiles() -> Json<ProfileCatalogResponse> {
    Json(ProfileCatalogResponse {
        profiles: profile_catalog(),
    })
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::DateTime;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn test_app() -> Router {
        build_router(Config::for_tests())
    }

    async fn read_json(response: axum::response::Response) -> Result<Value> {
        let bytes = response.into_body().collect().await?.to_bytes();
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn issue_token(app: &Router, domain: &str) -> Result<String> {
        let request = Request::builder()
            .method("POST")
            .uri("/api/tokens/generate")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "domain": domain,
                    "description": "test site",
                    "adminKey": config::DEFAULT_ADMIN_KEY,
                })
                .to_string(),
            ))?;
        let response = app.clone().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await?;
        Ok(body["token"].as_str().unwrap_or_default().to_string())
    }

    async fn save_profile(
        app: &Router,
        token: &str,
        user_id: &str,
        profile: &str,
        custom_settings: Value,
    ) -> Result<axum::response::Response> {
        let request = Request::builder()
            .method("POST")
            .uri("/api/settings/save")
            .header("content-type", "application/json")
            .header("x-api-token", token)
            .body(Body::from(
                json!({
                    "userId": user_id,
                    "profile": profile,
                    "customSettings": custom_settings,
                })
                .to_string(),
            ))?;
        Ok(app.clone().oneshot(request).await?)
    }

    #[tokio::test]
    async fn health_route_reports_ok_with_timestamp() -> Result<()> {
        let app = test_app();
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await?;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "attune-api");
        let timestamp = body["timestamp"].as_str().unwrap_or_default();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn readiness_reports_ready_for_in_memory_stores() -> Result<()> {
        let app = test_app();
        let response = app
            .oneshot(Request::builder().uri("/api/readyz").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await?;
        assert_eq!(body["status"], "ready");
        Ok(())
    }

    #[tokio::test]
    async fn generating_twice_yields_distinct_tokens_that_both_validate() -> Result<()> {
        let app = test_app();
        let first = issue_token(&app, "a.example").await?;
        let second = issue_token(&app, "b.example").await?;
        assert_ne!(first, second);

        for (token, domain) in [(&first, "a.example"), (&second, "b.example")] {
            let request = Request::builder()
                .uri("/api/tokens/validate")
                .header("x-api-token", token.as_str())
                .body(Body::empty())?;
            let response = app.clone().oneshot(request).await?;
            assert_eq!(response.status(), StatusCode::OK);
            let body = read_json(response).await?;
            assert_eq!(body["valid"], true);
            assert_eq!(body["domain"], *domain);
        }
        Ok(())
    }

    #[tokio::test]
    async fn generate_rejects_bad_admin_key() -> Result<()> {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/tokens/generate")
            .header("content-type", "application/json")
            .body(Body::from(json!({"adminKey": "wrong"}).to_string()))?;
        let response = app.oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await?;
        assert_eq!(body["code"], "unauthorized");
        Ok(())
    }

    #[tokio::test]
    async fn list_requires_admin_and_shows_usage_counters() -> Result<()> {
        let app = test_app();
        let token = issue_token(&app, "a.example").await?;

        let unauthorized = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/tokens/list")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

        // One validated request bumps the counter.
        let validate = Request::builder()
            .uri("/api/tokens/validate")
            .header("x-api-token", token.as_str())
            .body(Body::empty())?;
        app.clone().oneshot(validate).await?;

        let request = Request::builder()
            .uri(format!(
                "/api/tokens/list?adminKey={}",
                config::DEFAULT_ADMIN_KEY
            ))
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await?;
        let listed = body["tokens"].as_array().map(Vec::as_slice).unwrap_or(&[]);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["token"], token);
        assert_eq!(listed[0]["requestCount"], 1);
        assert!(listed[0]["lastUsed"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn deactivation_forbids_later_validation() -> Result<()> {
        let app = test_app();
        let token = issue_token(&app, "a.example").await?;

        let deactivate = Request::builder()
            .method("POST")
            .uri("/api/tokens/deactivate")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"token": token, "adminKey": config::DEFAULT_ADMIN_KEY}).to_string(),
            ))?;
        let response = app.clone().oneshot(deactivate).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await?;
        assert_eq!(body["success"], true);

        let validate = Request::builder()
            .uri("/api/tokens/validate")
            .header("x-api-token", token.as_str())
            .body(Body::empty())?;
        let response = app.oneshot(validate).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn deactivate_rejects_bad_admin_key() -> Result<()> {
        let app = test_app();
        let token = issue_token(&app, "a.example").await?;

        let request = Request::builder()
            .method("POST")
            .uri("/api/tokens/deactivate")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"token": token, "adminKey": "wrong"}).to_string(),
            ))?;
        let response = app.clone().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // The token must still validate afterwards.
        let validate = Request::builder()
            .uri("/api/tokens/validate")
            .header("x-api-token", token.as_str())
            .body(Body::empty())?;
        let response = app.oneshot(validate).await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn deactivating_unknown_token_returns_not_found() -> Result<()> {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/tokens/deactivate")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"token": "attune_unknown", "adminKey": config::DEFAULT_ADMIN_KEY})
                    .to_string(),
            ))?;
        let response = app.oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_json(response).await?;
        assert_eq!(body["code"], "not_found");
        Ok(())
    }

    #[tokio::test]
    async fn validate_without_token_is_unauthorized() -> Result<()> {
        let app = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/tokens/validate")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = read_json(response).await?;
        assert_eq!(body["error"], "API token required");
        Ok(())
    }

    #[tokio::test]
    async fn validate_with_garbage_token_is_forbidden() -> Result<()> {
        let app = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/tokens/validate")
                    .header("x-api-token", "attune_garbage")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = read_json(response).await?;
        assert_eq!(body["error"], "Invalid or inactive token");
        Ok(())
    }

    #[tokio::test]
    async fn token_query_parameter_is_accepted() -> Result<()> {
        let app = test_app();
        let token = issue_token(&app, "a.example").await?;

        let request = Request::builder()
            .uri(format!("/api/tokens/validate?token={token}"))
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn settings_round_trip_preserves_profile_and_custom_settings() -> Result<()> {
        let app = test_app();
        let token = issue_token(&app, "a.example").await?;

        let response =
            save_profile(&app, &token, "user_1", "dyslexia", json!({"x": 1})).await?;
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .uri("/api/settings/load?userId=user_1")
            .header("x-api-token", token.as_str())
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await?;
        assert_eq!(body["profile"], "dyslexia");
        assert_eq!(body["customSettings"]["x"], 1);
        assert!(body["updatedAt"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn settings_are_isolated_per_token() -> Result<()> {
        let app = test_app();
        let token_a = issue_token(&app, "a.example").await?;
        let token_b = issue_token(&app, "b.example").await?;

        save_profile(&app, &token_a, "user_1", "adhd", json!({})).await?;

        let request = Request::builder()
            .uri("/api/settings/load?userId=user_1")
            .header("x-api-token", token_b.as_str())
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await?;
        assert_eq!(body["profile"], "standard");
        Ok(())
    }

    #[tokio::test]
    async fn load_without_prior_save_returns_standard_default() -> Result<()> {
        let app = test_app();
        let token = issue_token(&app, "a.example").await?;

        let request = Request::builder()
            .uri("/api/settings/load?userId=fresh_user")
            .header("x-api-token", token.as_str())
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await?;
        assert_eq!(body["profile"], "standard");
        assert_eq!(body["customSettings"], json!({}));
        Ok(())
    }

    #[tokio::test]
    async fn settings_routes_require_user_id() -> Result<()> {
        let app = test_app();
        let token = issue_token(&app, "a.example").await?;

        let save = Request::builder()
            .method("POST")
            .uri("/api/settings/save")
            .header("content-type", "application/json")
            .header("x-api-token", token.as_str())
            .body(Body::from(json!({"profile": "adhd"}).to_string()))?;
        let response = app.clone().oneshot(save).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let load = Request::builder()
            .uri("/api/settings/load")
            .header("x-api-token", token.as_str())
            .body(Body::empty())?;
        let response = app.oneshot(load).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await?;
        assert_eq!(body["error"], "userId required");
        Ok(())
    }

    #[tokio::test]
    async fn profiles_route_requires_token_and_returns_catalog() -> Result<()> {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/profiles").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let token = issue_token(&app, "a.example").await?;
        let request = Request::builder()
            .uri("/api/profiles")
            .header("x-api-token", token.as_str())
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await?;
        let catalog = body["profiles"].as_array().map(Vec::as_slice).unwrap_or(&[]);
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog[0]["id"], "standard");
        assert_eq!(catalog[1]["features"][0], "increased-spacing");
        Ok(())
    }
}
