//! Members: the enrolled people allowed through the facility.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned member id.
pub type MemberId = i64;

/// Opaque reference to a person in the identity directory.
///
/// One-to-one with a member. The directory and the store can drift apart
/// (a member deactivated, an identity left over from a failed enrollment), so
/// a reference resolving in the directory says nothing about the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityRef(pub String);

impl IdentityRef {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for IdentityRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<String> for IdentityRef {
  fn from(s: String) -> Self { Self(s) }
}

/// A member record. Members are deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
  pub member_id:         MemberId,
  pub name:              String,
  pub email:             String,
  pub phone:             Option<String>,
  pub identity_ref:      IdentityRef,
  pub active:            bool,
  /// Remaining guests this member may escort in.
  pub guest_invitations: u32,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::AccessStore::insert_member`].
/// `member_id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMember {
  pub name:              String,
  pub email:             String,
  pub phone:             Option<String>,
  pub identity_ref:      IdentityRef,
  pub guest_invitations: u32,
}
