//! Presence sessions: open/close intervals for the building and for rooms.
//!
//! Sessions are created and closed only by the admission and occupancy
//! decisions on [`crate::AccessControl`]; nothing else mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{member::MemberId, room::RoomId};

// ─── Direction ───────────────────────────────────────────────────────────────

/// The declared movement across a facility or room boundary.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Direction {
  #[serde(alias = "enter")]
  Enter,
  #[serde(alias = "exit")]
  Exit,
}

// ─── Subjects ────────────────────────────────────────────────────────────────

/// Who a session belongs to.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubjectKind {
  Member,
  Guest,
}

/// Reference to the person a session is about.
///
/// Guests have no enrolled face; a guest is identified by the pass issued at
/// admission, which is the id of their facility session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubjectRef {
  Member { member_id: MemberId },
  Guest { pass_id: Uuid },
}

impl SubjectRef {
  pub fn kind(&self) -> SubjectKind {
    match self {
      Self::Member { .. } => SubjectKind::Member,
      Self::Guest { .. } => SubjectKind::Guest,
    }
  }
}

// ─── Facility ────────────────────────────────────────────────────────────────

/// One "inside the building" period. At most one is open per subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitySession {
  pub session_id: Uuid,
  pub subject:    SubjectRef,
  /// The escorting member, for guest sessions.
  pub escort_id:  Option<MemberId>,
  pub opened_at:  DateTime<Utc>,
  pub closed_at:  Option<DateTime<Utc>>,
}

impl FacilitySession {
  pub fn is_open(&self) -> bool { self.closed_at.is_none() }
}

// ─── Rooms ───────────────────────────────────────────────────────────────────

/// One "inside this room" period. At most one is open per (subject, room).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSession {
  pub session_id: Uuid,
  pub subject:    SubjectRef,
  pub room_id:    RoomId,
  pub opened_at:  DateTime<Utc>,
  pub closed_at:  Option<DateTime<Utc>>,
}

impl RoomSession {
  pub fn is_open(&self) -> bool { self.closed_at.is_none() }

  /// Whole minutes spent inside; `None` while the session is open.
  ///
  /// Never negative, even if the clock stepped backwards in between.
  pub fn dwell_minutes(&self) -> Option<i64> {
    self
      .closed_at
      .map(|closed| (closed - self.opened_at).num_minutes().max(0))
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn room_session(opened_at: DateTime<Utc>, closed_at: Option<DateTime<Utc>>) -> RoomSession {
    RoomSession {
      session_id: Uuid::new_v4(),
      subject: SubjectRef::Member { member_id: 1 },
      room_id: 1,
      opened_at,
      closed_at,
    }
  }

  #[test]
  fn dwell_is_none_while_open() {
    assert_eq!(room_session(Utc::now(), None).dwell_minutes(), None);
  }

  #[test]
  fn dwell_counts_whole_minutes() {
    let opened = Utc::now();
    let s = room_session(opened, Some(opened + Duration::seconds(185)));
    assert_eq!(s.dwell_minutes(), Some(3));
  }

  #[test]
  fn dwell_clamps_clock_skew_to_zero() {
    let opened = Utc::now();
    let s = room_session(opened, Some(opened - Duration::minutes(2)));
    assert_eq!(s.dwell_minutes(), Some(0));
  }

  #[test]
  fn direction_accepts_both_cases() {
    let upper: Direction = serde_json::from_str("\"ENTER\"").unwrap();
    let lower: Direction = serde_json::from_str("\"exit\"").unwrap();
    assert_eq!(upper, Direction::Enter);
    assert_eq!(lower, Direction::Exit);
    assert_eq!(Direction::Exit.to_string(), "EXIT");
  }

  #[test]
  fn subject_ref_is_tagged_by_kind() {
    let json = serde_json::to_value(SubjectRef::Member { member_id: 7 }).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "member", "member_id": 7 }));
  }
}
