//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body is `{"error": <message>, "code": <CODE>}`; a full room
//! adds `occupied` and `capacity`.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use gym_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The request could not be decoded before reaching the core.
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Access(#[from] CoreError),
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

fn status_of(e: &CoreError) -> StatusCode {
  match e {
    CoreError::InvalidInput(_)
    | CoreError::NoFaceDetected
    | CoreError::MultipleFacesDetected(_)
    | CoreError::EscortRequired
    | CoreError::NoInvitationsLeft(_)
    | CoreError::RoomFull { .. } => StatusCode::BAD_REQUEST,
    CoreError::PersonNotRecognized => StatusCode::FORBIDDEN,
    CoreError::MemberNotFound(_)
    | CoreError::RoomNotFound(_)
    | CoreError::NoOpenSession(_) => StatusCode::NOT_FOUND,
    CoreError::SessionStateConflict(_) => StatusCode::CONFLICT,
    CoreError::IdentityService(_)
    | CoreError::DirectoryCreateFailed(_)
    | CoreError::DirectoryEnrollFailed(_)
    | CoreError::TrainingFailed(_)
    | CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::BadRequest(m) => (
        StatusCode::BAD_REQUEST,
        json!({ "error": m, "code": "INVALID_INPUT" }),
      ),
      ApiError::Access(e) => {
        let status = status_of(e);
        if status.is_server_error() {
          error!(code = e.code(), error = %e, "request failed");
        }
        let mut body = json!({ "error": e.to_string(), "code": e.code() });
        if let CoreError::RoomFull { occupied, capacity } = e {
          body["occupied"] = json!(occupied);
          body["capacity"] = json!(capacity);
        }
        (status, body)
      }
    };
    (status, Json(body)).into_response()
  }
}
