//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use plaza_core::{Classify, ErrorKind};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// A classified failure from a store or identity resolver.
  #[error("{message}")]
  Store { kind: ErrorKind, message: String },

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("bad request: {0}")]
  BadRequest(String),
}

impl ApiError {
  /// Wrap any classified error. Internal failures are logged here and
  /// reported to the client without their details.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Classify,
  {
    let kind = err.kind();
    let message = if kind == ErrorKind::Internal {
      tracing::error!(error = %err, "internal error");
      "internal error".to_owned()
    } else {
      err.to_string()
    };
    ApiError::Store { kind, message }
  }

  /// The `kind` reported in the response body.
  pub fn kind(&self) -> &str {
    match self {
      ApiError::Store { kind, .. } => kind.as_ref(),
      ApiError::Unauthorized(_) => "unauthorized",
      ApiError::BadRequest(_) => "invalid_input",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Store { kind, .. } => match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
    }
  }
}

impl From<plaza_core::Error> for ApiError {
  fn from(err: plaza_core::Error) -> Self { ApiError::store(err) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let body = Json(json!({ "error": self.to_string(), "kind": self.kind() }));
    (self.status(), body).into_response()
  }
}
