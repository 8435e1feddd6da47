//! Encoding and decoding helpers between the gym domain types and their
//! SQLite column representations.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings. A
//! [`SubjectRef`] is split over two columns: `subject_kind` (`member` or
//! `guest`) and `subject_key` (the member id or the pass UUID).

use chrono::{DateTime, Utc};
use gym_core::{
  member::{IdentityRef, Member},
  room::Room,
  session::{FacilitySession, RoomSession, SubjectKind, SubjectRef},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Subjects ────────────────────────────────────────────────────────────────

/// `(subject_kind, subject_key)` column values for a subject.
pub fn encode_subject(subject: SubjectRef) -> (String, String) {
  let key = match subject {
    SubjectRef::Member { member_id } => member_id.to_string(),
    SubjectRef::Guest { pass_id } => encode_uuid(pass_id),
  };
  (subject.kind().as_ref().to_owned(), key)
}

pub fn decode_subject(kind: &str, key: &str) -> Result<SubjectRef> {
  let kind = kind
    .parse::<SubjectKind>()
    .map_err(|_| Error::Decode(format!("unknown subject kind: {kind:?}")))?;
  match kind {
    SubjectKind::Member => key
      .parse()
      .map(|member_id| SubjectRef::Member { member_id })
      .map_err(|_| Error::Decode(format!("bad member key: {key:?}"))),
    SubjectKind::Guest => Ok(SubjectRef::Guest { pass_id: decode_uuid(key)? }),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const MEMBER_COLUMNS: &str = "member_id, name, email, phone, identity_ref, \
                                  active, guest_invitations, created_at";

pub const ROOM_COLUMNS: &str = "room_id, name, max_occupancy, active";

pub const FACILITY_COLUMNS: &str =
  "session_id, subject_kind, subject_key, escort_id, opened_at, closed_at";

pub const ROOM_SESSION_COLUMNS: &str =
  "session_id, subject_kind, subject_key, room_id, opened_at, closed_at";

/// A `members` row as read from SQLite, in [`MEMBER_COLUMNS`] order.
pub struct RawMember {
  pub member_id:         i64,
  pub name:              String,
  pub email:             String,
  pub phone:             Option<String>,
  pub identity_ref:      String,
  pub active:            bool,
  pub guest_invitations: u32,
  pub created_at:        String,
}

impl RawMember {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:         row.get(0)?,
      name:              row.get(1)?,
      email:             row.get(2)?,
      phone:             row.get(3)?,
      identity_ref:      row.get(4)?,
      active:            row.get(5)?,
      guest_invitations: row.get(6)?,
      created_at:        row.get(7)?,
    })
  }

  pub fn into_member(self) -> Result<Member> {
    Ok(Member {
      member_id:         self.member_id,
      name:              self.name,
      email:             self.email,
      phone:             self.phone,
      identity_ref:      IdentityRef(self.identity_ref),
      active:            self.active,
      guest_invitations: self.guest_invitations,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Rooms hold no encoded columns and decode straight from the row.
pub fn room_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
  Ok(Room {
    room_id:       row.get(0)?,
    name:          row.get(1)?,
    max_occupancy: row.get(2)?,
    active:        row.get(3)?,
  })
}

/// A `facility_sessions` row, in [`FACILITY_COLUMNS`] order.
pub struct RawFacilitySession {
  pub session_id:   String,
  pub subject_kind: String,
  pub subject_key:  String,
  pub escort_id:    Option<i64>,
  pub opened_at:    String,
  pub closed_at:    Option<String>,
}

impl RawFacilitySession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:   row.get(0)?,
      subject_kind: row.get(1)?,
      subject_key:  row.get(2)?,
      escort_id:    row.get(3)?,
      opened_at:    row.get(4)?,
      closed_at:    row.get(5)?,
    })
  }

  pub fn into_session(self) -> Result<FacilitySession> {
    Ok(FacilitySession {
      session_id: decode_uuid(&self.session_id)?,
      subject:    decode_subject(&self.subject_kind, &self.subject_key)?,
      escort_id:  self.escort_id,
      opened_at:  decode_dt(&self.opened_at)?,
      closed_at:  decode_opt_dt(self.closed_at.as_deref())?,
    })
  }
}

/// A `room_sessions` row, in [`ROOM_SESSION_COLUMNS`] order.
pub struct RawRoomSession {
  pub session_id:   String,
  pub subject_kind: String,
  pub subject_key:  String,
  pub room_id:      i64,
  pub opened_at:    String,
  pub closed_at:    Option<String>,
}

impl RawRoomSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:   row.get(0)?,
      subject_kind: row.get(1)?,
      subject_key:  row.get(2)?,
      room_id:      row.get(3)?,
      opened_at:    row.get(4)?,
      closed_at:    row.get(5)?,
    })
  }

  pub fn into_session(self) -> Result<RoomSession> {
    Ok(RoomSession {
      session_id: decode_uuid(&self.session_id)?,
      subject:    decode_subject(&self.subject_kind, &self.subject_key)?,
      room_id:    self.room_id,
      opened_at:  decode_dt(&self.opened_at)?,
      closed_at:  decode_opt_dt(self.closed_at.as_deref())?,
    })
  }
}
