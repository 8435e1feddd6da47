//! [`SqliteStore`], the SQLite implementation of [`AccessStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use gym_core::{
  member::{IdentityRef, Member, MemberId, NewMember},
  room::{NewRoom, Room, RoomId},
  session::{FacilitySession, RoomSession, SubjectKind, SubjectRef},
  store::{
    AccessStore, FacilityEntry, GuestEntry, OccupancyCounts, RoomEntry,
    RoomOccupancy,
  },
};

use crate::{
  Result,
  encode::{
    FACILITY_COLUMNS, MEMBER_COLUMNS, RawFacilitySession, RawMember,
    RawRoomSession, ROOM_COLUMNS, ROOM_SESSION_COLUMNS, encode_dt,
    encode_subject, encode_uuid, room_from_row,
  },
  schema::SCHEMA,
};

// ─── Raw outcomes ────────────────────────────────────────────────────────────

// Outcomes as computed on the database thread, before decoding.

enum RawFacilityEntry {
  Opened,
  AlreadyOpen(RawFacilitySession),
}

enum RawGuestEntry {
  Admitted(RawMember),
  EscortNotFound,
  NoInvitationsLeft,
}

enum RawRoomEntry {
  Entered { occupied_before: u32, capacity: u32 },
  RoomNotFound,
  UnknownSubject,
  Full { occupied: u32, capacity: u32 },
  AlreadyInside(RawRoomSession),
}

struct RawCounts {
  rooms:          Vec<(Room, u32)>,
  members_inside: u32,
  guests_inside:  u32,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A gym access store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Separate
/// `open` calls on the same path give independent connections that
/// serialise their writes through SQLite's own locking.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a prepared facility session row inside an open transaction.
  fn insert_facility_session(
    tx: &rusqlite::Transaction<'_>,
    session: &FacilitySessionRow,
  ) -> rusqlite::Result<()> {
    tx.execute(
      "INSERT INTO facility_sessions
         (session_id, subject_kind, subject_key, escort_id, opened_at)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![
        session.session_id,
        session.subject_kind,
        session.subject_key,
        session.escort_id,
        session.opened_at,
      ],
    )?;
    Ok(())
  }

  async fn close_facility_session(
    &self,
    subject: SubjectRef,
  ) -> Result<Option<FacilitySession>> {
    let (kind, key) = encode_subject(subject);
    let now = encode_dt(Utc::now());

    let raw: Option<RawFacilitySession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "UPDATE facility_sessions SET closed_at = ?1
                 WHERE subject_kind = ?2 AND subject_key = ?3 AND closed_at IS NULL
                 RETURNING {FACILITY_COLUMNS}"
              ),
              rusqlite::params![now, kind, key],
              RawFacilitySession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFacilitySession::into_session).transpose()
  }
}

/// Column values of a facility session about to be inserted.
struct FacilitySessionRow {
  session_id:   String,
  subject_kind: String,
  subject_key:  String,
  escort_id:    Option<i64>,
  opened_at:    String,
}

impl From<&FacilitySession> for FacilitySessionRow {
  fn from(s: &FacilitySession) -> Self {
    let (subject_kind, subject_key) = encode_subject(s.subject);
    Self {
      session_id: encode_uuid(s.session_id),
      subject_kind,
      subject_key,
      escort_id: s.escort_id,
      opened_at: encode_dt(s.opened_at),
    }
  }
}

// ─── AccessStore impl ────────────────────────────────────────────────────────

impl AccessStore for SqliteStore {
  type Error = crate::Error;

  // ── Members ───────────────────────────────────────────────────────────────

  async fn insert_member(&self, input: NewMember) -> Result<Member> {
    let created_at = encode_dt(Utc::now());

    let raw: RawMember = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO members
               (name, email, phone, identity_ref, active, guest_invitations, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)
             RETURNING {MEMBER_COLUMNS}"
          ),
          rusqlite::params![
            input.name,
            input.email,
            input.phone,
            input.identity_ref.0,
            input.guest_invitations,
            created_at,
          ],
          RawMember::from_row,
        )?)
      })
      .await?;

    raw.into_member()
  }

  async fn get_member(&self, id: MemberId) -> Result<Option<Member>> {
    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE member_id = ?1"),
              rusqlite::params![id],
              RawMember::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMember::into_member).transpose()
  }

  async fn find_active_member_by_identity(
    &self,
    identity: &IdentityRef,
  ) -> Result<Option<Member>> {
    let identity = identity.0.clone();

    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {MEMBER_COLUMNS} FROM members
                 WHERE identity_ref = ?1 AND active = 1"
              ),
              rusqlite::params![identity],
              RawMember::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMember::into_member).transpose()
  }

  async fn deactivate_member(&self, id: MemberId) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE members SET active = 0 WHERE member_id = ?1",
          rusqlite::params![id],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  // ── Rooms ─────────────────────────────────────────────────────────────────

  async fn upsert_room(&self, input: NewRoom) -> Result<Room> {
    let room = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO rooms (name, max_occupancy, active) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
               max_occupancy = excluded.max_occupancy,
               active        = excluded.active
             RETURNING {ROOM_COLUMNS}"
          ),
          rusqlite::params![input.name, input.max_occupancy, input.active],
          room_from_row,
        )?)
      })
      .await?;
    Ok(room)
  }

  async fn list_active_rooms(&self) -> Result<Vec<Room>> {
    let rooms = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ROOM_COLUMNS} FROM rooms WHERE active = 1 ORDER BY name"
        ))?;
        let rows = stmt
          .query_map([], room_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rooms)
  }

  // ── Facility sessions ─────────────────────────────────────────────────────

  async fn open_member_session(&self, member_id: MemberId) -> Result<FacilityEntry> {
    let session = FacilitySession {
      session_id: Uuid::new_v4(),
      subject:    SubjectRef::Member { member_id },
      escort_id:  None,
      opened_at:  Utc::now(),
      closed_at:  None,
    };
    let row = FacilitySessionRow::from(&session);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
          .query_row(
            &format!(
              "SELECT {FACILITY_COLUMNS} FROM facility_sessions
               WHERE subject_kind = ?1 AND subject_key = ?2 AND closed_at IS NULL"
            ),
            rusqlite::params![row.subject_kind, row.subject_key],
            RawFacilitySession::from_row,
          )
          .optional()?;
        if let Some(existing) = existing {
          return Ok(RawFacilityEntry::AlreadyOpen(existing));
        }

        Self::insert_facility_session(&tx, &row)?;
        tx.commit()?;
        Ok(RawFacilityEntry::Opened)
      })
      .await?;

    match raw {
      RawFacilityEntry::Opened => Ok(FacilityEntry::Opened(session)),
      RawFacilityEntry::AlreadyOpen(existing) => {
        Ok(FacilityEntry::AlreadyOpen(existing.into_session()?))
      }
    }
  }

  async fn close_member_session(
    &self,
    member_id: MemberId,
  ) -> Result<Option<FacilitySession>> {
    self
      .close_facility_session(SubjectRef::Member { member_id })
      .await
  }

  async fn admit_guest(&self, escort_id: MemberId) -> Result<GuestEntry> {
    let pass_id = Uuid::new_v4();
    let session = FacilitySession {
      session_id: pass_id,
      subject:    SubjectRef::Guest { pass_id },
      escort_id:  Some(escort_id),
      opened_at:  Utc::now(),
      closed_at:  None,
    };
    let row = FacilitySessionRow::from(&session);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let escort = tx
          .query_row(
            &format!(
              "SELECT {MEMBER_COLUMNS} FROM members
               WHERE member_id = ?1 AND active = 1"
            ),
            rusqlite::params![escort_id],
            RawMember::from_row,
          )
          .optional()?;
        let Some(mut escort) = escort else {
          return Ok(RawGuestEntry::EscortNotFound);
        };
        if escort.guest_invitations == 0 {
          return Ok(RawGuestEntry::NoInvitationsLeft);
        }

        tx.execute(
          "UPDATE members SET guest_invitations = guest_invitations - 1
           WHERE member_id = ?1",
          rusqlite::params![escort_id],
        )?;
        Self::insert_facility_session(&tx, &row)?;
        tx.commit()?;

        escort.guest_invitations -= 1;
        Ok(RawGuestEntry::Admitted(escort))
      })
      .await?;

    match raw {
      RawGuestEntry::Admitted(escort) => {
        debug!(escort_id, %pass_id, "guest session opened");
        Ok(GuestEntry::Admitted { session, escort: escort.into_member()? })
      }
      RawGuestEntry::EscortNotFound => Ok(GuestEntry::EscortNotFound),
      RawGuestEntry::NoInvitationsLeft => Ok(GuestEntry::NoInvitationsLeft),
    }
  }

  async fn close_guest_session(
    &self,
    pass_id: Uuid,
  ) -> Result<Option<FacilitySession>> {
    self
      .close_facility_session(SubjectRef::Guest { pass_id })
      .await
  }

  // ── Room sessions ─────────────────────────────────────────────────────────

  async fn try_open_room_session(
    &self,
    subject: SubjectRef,
    room_id: RoomId,
  ) -> Result<RoomEntry> {
    let session = RoomSession {
      session_id: Uuid::new_v4(),
      subject,
      room_id,
      opened_at: Utc::now(),
      closed_at: None,
    };
    let id_str = encode_uuid(session.session_id);
    let at_str = encode_dt(session.opened_at);
    let (kind, key) = encode_subject(subject);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let capacity: Option<u32> = tx
          .query_row(
            "SELECT max_occupancy FROM rooms WHERE room_id = ?1 AND active = 1",
            rusqlite::params![room_id],
            |r| r.get(0),
          )
          .optional()?;
        let Some(capacity) = capacity else {
          return Ok(RawRoomEntry::RoomNotFound);
        };

        let known = match subject {
          SubjectRef::Member { member_id } => tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM members WHERE member_id = ?1 AND active = 1)",
            rusqlite::params![member_id],
            |r| r.get::<_, bool>(0),
          )?,
          SubjectRef::Guest { .. } => tx.query_row(
            "SELECT EXISTS (
               SELECT 1 FROM facility_sessions
               WHERE subject_kind = ?1 AND subject_key = ?2 AND closed_at IS NULL
             )",
            rusqlite::params![kind, key],
            |r| r.get::<_, bool>(0),
          )?,
        };
        if !known {
          return Ok(RawRoomEntry::UnknownSubject);
        }

        let existing = tx
          .query_row(
            &format!(
              "SELECT {ROOM_SESSION_COLUMNS} FROM room_sessions
               WHERE subject_kind = ?1 AND subject_key = ?2 AND room_id = ?3
                 AND closed_at IS NULL"
            ),
            rusqlite::params![kind, key, room_id],
            RawRoomSession::from_row,
          )
          .optional()?;
        if let Some(existing) = existing {
          return Ok(RawRoomEntry::AlreadyInside(existing));
        }

        let occupied: u32 = tx.query_row(
          "SELECT COUNT(*) FROM room_sessions WHERE room_id = ?1 AND closed_at IS NULL",
          rusqlite::params![room_id],
          |r| r.get(0),
        )?;
        if occupied >= capacity {
          return Ok(RawRoomEntry::Full { occupied, capacity });
        }

        tx.execute(
          "INSERT INTO room_sessions
             (session_id, subject_kind, subject_key, room_id, opened_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, kind, key, room_id, at_str],
        )?;
        tx.commit()?;
        Ok(RawRoomEntry::Entered { occupied_before: occupied, capacity })
      })
      .await?;

    Ok(match raw {
      RawRoomEntry::Entered { occupied_before, capacity } => {
        RoomEntry::Entered { session, occupied_before, capacity }
      }
      RawRoomEntry::RoomNotFound => RoomEntry::RoomNotFound,
      RawRoomEntry::UnknownSubject => RoomEntry::UnknownSubject,
      RawRoomEntry::Full { occupied, capacity } => RoomEntry::Full { occupied, capacity },
      RawRoomEntry::AlreadyInside(existing) => {
        RoomEntry::AlreadyInside(existing.into_session()?)
      }
    })
  }

  async fn close_room_session(
    &self,
    subject: SubjectRef,
    room_id: RoomId,
  ) -> Result<Option<RoomSession>> {
    let (kind, key) = encode_subject(subject);
    let now = encode_dt(Utc::now());

    let raw: Option<RawRoomSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "UPDATE room_sessions SET closed_at = ?1
                 WHERE subject_kind = ?2 AND subject_key = ?3 AND room_id = ?4
                   AND closed_at IS NULL
                 RETURNING {ROOM_SESSION_COLUMNS}"
              ),
              rusqlite::params![now, kind, key, room_id],
              RawRoomSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRoomSession::into_session).transpose()
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn occupancy(&self) -> Result<OccupancyCounts> {
    let member_kind = SubjectKind::Member.as_ref().to_owned();
    let guest_kind = SubjectKind::Guest.as_ref().to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        // One read transaction, so rooms and totals describe the same instant.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;

        let rooms = {
          let mut stmt = tx.prepare(
            "SELECT r.room_id, r.name, r.max_occupancy, r.active,
                    (SELECT COUNT(*) FROM room_sessions s
                      WHERE s.room_id = r.room_id AND s.closed_at IS NULL)
             FROM rooms r
             WHERE r.active = 1
             ORDER BY r.name",
          )?;
          stmt
            .query_map([], |row| Ok((room_from_row(row)?, row.get::<_, u32>(4)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let (members_inside, guests_inside): (u32, u32) = tx.query_row(
          "SELECT
             COALESCE(SUM(CASE WHEN subject_kind = ?1 THEN 1 ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN subject_kind = ?2 THEN 1 ELSE 0 END), 0)
           FROM facility_sessions
           WHERE closed_at IS NULL",
          rusqlite::params![member_kind, guest_kind],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        tx.commit()?;
        Ok(RawCounts { rooms, members_inside, guests_inside })
      })
      .await?;

    Ok(OccupancyCounts {
      taken_at:       Utc::now(),
      rooms:          raw
        .rooms
        .into_iter()
        .map(|(room, occupied)| RoomOccupancy { room, occupied })
        .collect(),
      members_inside: raw.members_inside,
      guests_inside:  raw.guests_inside,
    })
  }
}
