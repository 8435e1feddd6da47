//! Error type for `gym-face`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("face API request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The service answered with a non-success status.
  #[error("face API returned {status} ({code}): {message}")]
  Api {
    status:  u16,
    code:    String,
    message: String,
  },

  #[error("unexpected face API response: {0}")]
  UnexpectedResponse(String),
}

impl Error {
  /// The service-level error code, e.g. `PersonGroupExists`.
  pub fn api_code(&self) -> Option<&str> {
    match self {
      Self::Api { code, .. } => Some(code),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
