//! Error types for `gym-core`.
//!
//! Every variant is a request-level failure surfaced to the caller as-is.
//! Nothing here is retried by the core.

use thiserror::Error;

use crate::{member::MemberId, room::RoomId};

/// A boxed backend error (store or identity directory).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("no face detected in image")]
  NoFaceDetected,

  #[error("{0} faces detected; exactly one person must be in frame")]
  MultipleFacesDetected(usize),

  #[error("identity service error: {0}")]
  IdentityService(#[source] BoxError),

  #[error("member not found or inactive: {0}")]
  MemberNotFound(String),

  #[error("a guest must be escorted by a member")]
  EscortRequired,

  #[error("member {0} has no guest invitations left")]
  NoInvitationsLeft(MemberId),

  #[error("person not recognized; must be a member or an escorted guest")]
  PersonNotRecognized,

  #[error("room {0} not found")]
  RoomNotFound(RoomId),

  #[error("room is full ({occupied}/{capacity})")]
  RoomFull { occupied: u32, capacity: u32 },

  #[error("no open session: {0}")]
  NoOpenSession(String),

  #[error("session state conflict: {0}")]
  SessionStateConflict(String),

  #[error("failed to create directory identity: {0}")]
  DirectoryCreateFailed(#[source] BoxError),

  #[error("failed to attach face to directory identity: {0}")]
  DirectoryEnrollFailed(#[source] BoxError),

  #[error("gallery training failed: {0}")]
  TrainingFailed(String),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl Error {
  /// Stable machine-readable code, as returned in API error bodies.
  pub fn code(&self) -> &'static str {
    match self {
      Self::InvalidInput(_) => "INVALID_INPUT",
      Self::NoFaceDetected => "NO_FACE_DETECTED",
      Self::MultipleFacesDetected(_) => "MULTIPLE_FACES_DETECTED",
      Self::IdentityService(_) => "IDENTITY_SERVICE_ERROR",
      Self::MemberNotFound(_) => "MEMBER_NOT_FOUND",
      Self::EscortRequired => "ESCORT_REQUIRED",
      Self::NoInvitationsLeft(_) => "NO_INVITATIONS_LEFT",
      Self::PersonNotRecognized => "PERSON_NOT_RECOGNIZED",
      Self::RoomNotFound(_) => "ROOM_NOT_FOUND",
      Self::RoomFull { .. } => "ROOM_FULL",
      Self::NoOpenSession(_) => "NO_OPEN_SESSION",
      Self::SessionStateConflict(_) => "SESSION_STATE_CONFLICT",
      Self::DirectoryCreateFailed(_) => "DIRECTORY_CREATE_FAILED",
      Self::DirectoryEnrollFailed(_) => "DIRECTORY_ENROLL_FAILED",
      Self::TrainingFailed(_) => "TRAINING_FAILED",
      Self::Store(_) => "STORE_ERROR",
    }
  }

  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub(crate) fn identity_service<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::IdentityService(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
