//! HTTP-facing error type. Every handler returns `Result<_, ApiError>`; the
//! response body is `{ "status": <code>, "message": <text> }`.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use thiserror::Error;
use tracing::warn;

use crate::domain::ValidationError;
use crate::evaluator::EvaluationError;
use crate::identity::IdentityError;
use crate::protocol::StatusOut;
use crate::state::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),
  #[error("{0}")]
  Unauthorized(String),
  #[error("{0}")]
  Forbidden(String),
  #[error("{0}")]
  NotFound(String),
  #[error("{0}")]
  Unprocessable(String),
  #[error("{0}")]
  Unavailable(String),
  #[error("upstream service error: {0}")]
  Upstream(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      warn!(target: "learn_backend", %status, error = %self, "Request failed");
    }
    (status, Json(StatusOut { status: status.as_u16(), message: self.to_string() })).into_response()
  }
}

impl From<ValidationError> for ApiError {
  fn from(e: ValidationError) -> Self {
    ApiError::BadRequest(e.to_string())
  }
}

impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self {
    match e {
      StoreError::ActivityNotFound(_) | StoreError::CourseNotFound(_) => ApiError::NotFound(e.to_string()),
      StoreError::AlreadyInCourse { .. } => ApiError::BadRequest(e.to_string()),
      StoreError::Invalid(v) => v.into(),
    }
  }
}

impl From<IdentityError> for ApiError {
  fn from(e: IdentityError) -> Self {
    match e {
      IdentityError::Unauthorized => ApiError::Unauthorized(e.to_string()),
      IdentityError::NotConfigured => ApiError::Unavailable(e.to_string()),
      _ => ApiError::Upstream(e.to_string()),
    }
  }
}

impl From<EvaluationError> for ApiError {
  fn from(e: EvaluationError) -> Self {
    ApiError::Unprocessable(e.to_string())
  }
}
