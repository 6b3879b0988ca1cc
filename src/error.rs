//! HTTP-facing error type. Handlers return `Result<_, ApiError>`.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::openai::LlmError;
use crate::quiz::QuizError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),
  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },
  #[error("too many requests, retry in {}s", .retry_after.as_secs())]
  RateLimited { retry_after: Duration },
  #[error(transparent)]
  Quiz(#[from] QuizError),
  #[error("AI service unavailable: {0}")]
  Llm(#[from] LlmError),
}

#[derive(Serialize)]
struct ErrorBody {
  error: &'static str,
  message: String,
}

impl ApiError {
  pub fn not_found(entity: &'static str, id: &str) -> Self {
    Self::NotFound { entity, id: id.to_string() }
  }

  fn status_and_code(&self) -> (StatusCode, &'static str) {
    match self {
      Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
      Self::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
      Self::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
      Self::Quiz(_) => (StatusCode::BAD_REQUEST, "INVALID_ANSWER"),
      Self::Llm(LlmError::Disabled) => (StatusCode::SERVICE_UNAVAILABLE, "AI_DISABLED"),
      Self::Llm(_) => (StatusCode::BAD_GATEWAY, "AI_ERROR"),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = self.status_and_code();
    if status.is_server_error() {
      error!(target: "grammar_backend", error = %self, "Request failed");
    }
    let retry_after = match &self {
      Self::RateLimited { retry_after } => Some(retry_after.as_secs().max(1)),
      _ => None,
    };
    let mut response = (status, Json(ErrorBody { error: code, message: self.to_string() })).into_response();
    if let Some(secs) = retry_after {
      response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
  }
}
