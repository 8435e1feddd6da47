//! Tunable rules applied by [`crate::AccessControl`].

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
  /// Minimum match score accepted as a positive identification.
  pub confidence_threshold:      f32,
  /// Guest invitations granted to a newly enrolled member.
  pub default_guest_invitations: u32,
  /// Delay between training-status polls after an enrollment.
  pub training_poll_interval_ms: u64,
  /// Polls to wait for training before giving up.
  pub training_max_polls:        u32,
}

impl Default for AccessPolicy {
  fn default() -> Self {
    Self {
      confidence_threshold:      0.7,
      default_guest_invitations: 5,
      training_poll_interval_ms: 1000,
      training_max_polls:        60,
    }
  }
}

impl AccessPolicy {
  pub fn training_poll_interval(&self) -> Duration {
    Duration::from_millis(self.training_poll_interval_ms)
  }
}
