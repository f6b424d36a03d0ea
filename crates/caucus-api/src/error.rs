//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use caucus_core::Error;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Core(e) => match e {
        Error::Validation(_) | Error::SignatureInvalid(_) => StatusCode::BAD_REQUEST,
        Error::BypassDisabled => StatusCode::FORBIDDEN,
        Error::NotFoundOrNotCompleted(_) => StatusCode::NOT_FOUND,
        Error::AnomalousTransition { .. } => StatusCode::CONFLICT,
        Error::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::EmptyResultSet(_) | Error::DataIntegrity(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(status = status.as_u16(), error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
