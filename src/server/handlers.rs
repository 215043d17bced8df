use super::AppState;
use crate::error::ApiError;
use crate::models::{GenerationRequest, GenerationResult, HealthResponse};
use axum::{body::Bytes, extract::State, Json};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Unrouted paths under `/api/`. Sits behind the rate limiter and
/// shadows the static client fallback.
pub async fn api_not_found() -> ApiError {
    ApiError::NotFound
}

/// `POST /api/generate-image`
///
/// The body is read raw so that malformed JSON or a non-string `prompt`
/// ends up as an empty prompt instead of an extractor rejection.
pub async fn generate_image(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerationResult>, ApiError> {
    let request = GenerationRequest::from_body(&body);
    let result = state.generator.generate(&request.prompt).await?;
    Ok(Json(result))
}
