//! Error handling and custom error types
//!
//! `Error` covers everything that can go wrong inside the library (config,
//! provider calls, IO). `ApiError` is the stable, client-facing taxonomy the
//! HTTP endpoint converts every failure into.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("AI provider returned no image")]
    EmptyResponse,

    #[error("Generic error: {0}")]
    Generic(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub const MSG_PROMPT_REQUIRED: &str = "Prompt is required";
pub const MSG_RATE_LIMITED: &str = "Too many requests. Please try again later.";
pub const MSG_GENERATION_FAILED: &str = "Image generation failed. Please try again.";
pub const MSG_UNAVAILABLE: &str = "Image generation service is temporarily unavailable";
pub const MSG_TIMED_OUT: &str = "Image generation timed out. Please try again.";
pub const MSG_CORS_REJECTED: &str = "Not allowed by CORS";
pub const MSG_NOT_FOUND: &str = "Not found";

/// Failures surfaced by the HTTP endpoints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 400, the caller can fix the prompt and resubmit.
    #[error("{0}")]
    InvalidInput(String),

    /// 429, carries the number of seconds until a slot frees up.
    #[error("{}", MSG_RATE_LIMITED)]
    RateLimited { retry_after: u64 },

    /// 503, no provider credential and mock mode off.
    #[error("{}", MSG_UNAVAILABLE)]
    ServiceUnavailable,

    /// 502, provider answered without an image.
    #[error("{}", MSG_GENERATION_FAILED)]
    UpstreamEmpty,

    /// 504
    #[error("{}", MSG_TIMED_OUT)]
    Timeout,

    /// 500, message is either generic or the underlying error text.
    #[error("{0}")]
    InternalError(String),

    /// 403, origin not on the production allow-list.
    #[error("{}", MSG_CORS_REJECTED)]
    CorsRejected,

    /// 404, unknown path under `/api/`.
    #[error("{}", MSG_NOT_FOUND)]
    NotFound,
}

impl ApiError {
    pub fn prompt_required() -> Self {
        ApiError::InvalidInput(MSG_PROMPT_REQUIRED.to_string())
    }

    pub fn prompt_too_long(max: usize) -> Self {
        ApiError::InvalidInput(format!("Prompt must be {} characters or fewer", max))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamEmpty => StatusCode::BAD_GATEWAY,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::CorsRejected => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

/// JSON body of every failed response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };

        let mut response = (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response();

        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
