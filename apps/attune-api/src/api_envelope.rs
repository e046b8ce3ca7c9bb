use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

pub type ApiErrorTuple = (StatusCode, Json<ApiErrorResponse>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalError,
}

impl ApiErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::InternalError => "internal_error",
        }
    }

    pub const fn default_status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub code: &'static str,
}

pub fn error_response(code: ApiErrorCode, message: impl Into<String>) -> ApiErrorTuple {
    (
        code.default_status(),
        Json(ApiErrorResponse {
            error: message.into(),
            code: code.as_str(),
        }),
    )
}

pub fn bad_request_error(message: impl Into<String>) -> ApiErrorTuple {
    error_response(ApiErrorCode::BadRequest, message)
}

pub fn unauthorized_error(message: impl Into<String>) -> ApiErrorTuple {
    error_response(ApiErrorCode::Unauthorized, message)
}

pub fn forbidden_error(message: impl Into<String>) -> ApiErrorTuple {
    error_response(ApiErrorCode::Forbidden, message)
}

pub fn not_found_error(message: impl Into<String>) -> ApiErrorTuple {
    error_response(ApiErrorCode::NotFound, message)
}

pub fn internal_error(message: impl Into<String>) -> ApiErrorTuple {
    error_response(ApiErrorCode::InternalError, message)
}
