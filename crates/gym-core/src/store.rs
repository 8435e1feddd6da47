//! The `AccessStore` trait and the outcomes of its atomic operations.
//!
//! The trait is implemented by storage backends (e.g. `gym-store-sqlite`).
//! Every operation that checks state and then writes based on it (room
//! entry, guest admission, session open/close) is a single trait method, so
//! a backend can run it as one atomic unit. Business refusals such as "room
//! full" come back as outcome variants; `Self::Error` is reserved for the
//! backend itself failing.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  member::{IdentityRef, Member, MemberId, NewMember},
  room::{NewRoom, Room, RoomId},
  session::{FacilitySession, RoomSession, SubjectRef},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of [`AccessStore::open_member_session`].
#[derive(Debug, Clone, PartialEq)]
pub enum FacilityEntry {
  Opened(FacilitySession),
  /// The member already had this session open; nothing was written.
  AlreadyOpen(FacilitySession),
}

/// Result of [`AccessStore::admit_guest`].
#[derive(Debug, Clone, PartialEq)]
pub enum GuestEntry {
  /// The escort's balance was decremented and the guest session opened.
  /// `escort` reflects the balance after the decrement.
  Admitted {
    session: FacilitySession,
    escort:  Member,
  },
  /// No active member with that id.
  EscortNotFound,
  NoInvitationsLeft,
}

/// Result of [`AccessStore::try_open_room_session`].
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEntry {
  Entered {
    session:         RoomSession,
    /// Open sessions in the room just before this one was added.
    occupied_before: u32,
    capacity:        u32,
  },
  /// No active room with that id.
  RoomNotFound,
  /// The member is unknown or inactive, or the guest pass is not open.
  UnknownSubject,
  Full {
    occupied: u32,
    capacity: u32,
  },
  /// The subject is already inside this room; nothing was written.
  AlreadyInside(RoomSession),
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RoomOccupancy {
  pub room:     Room,
  pub occupied: u32,
}

/// Occupancy counts read at a single point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyCounts {
  pub taken_at:       DateTime<Utc>,
  /// Active rooms, ordered by name.
  pub rooms:          Vec<RoomOccupancy>,
  pub members_inside: u32,
  pub guests_inside:  u32,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the member/room/session store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AccessStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Members ───────────────────────────────────────────────────────────

  /// Persist a new, active member.
  fn insert_member(
    &self,
    input: NewMember,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + '_;

  /// Retrieve a member by id, active or not.
  fn get_member(
    &self,
    id: MemberId,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + '_;

  /// Resolve a directory identity to its member, only if that member is
  /// active.
  fn find_active_member_by_identity<'a>(
    &'a self,
    identity: &'a IdentityRef,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + 'a;

  /// Mark a member inactive. Returns `false` if no such member exists.
  fn deactivate_member(
    &self,
    id: MemberId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Rooms ─────────────────────────────────────────────────────────────

  /// Insert a room, or update the capacity and active flag of the room with
  /// the same name.
  fn upsert_room(
    &self,
    input: NewRoom,
  ) -> impl Future<Output = Result<Room, Self::Error>> + Send + '_;

  /// All active rooms, ordered by name.
  fn list_active_rooms(
    &self,
  ) -> impl Future<Output = Result<Vec<Room>, Self::Error>> + Send + '_;

  // ── Facility sessions ─────────────────────────────────────────────────

  /// Open a facility session for a member unless one is already open.
  fn open_member_session(
    &self,
    member_id: MemberId,
  ) -> impl Future<Output = Result<FacilityEntry, Self::Error>> + Send + '_;

  /// Close the member's open facility session; `None` if there is none.
  fn close_member_session(
    &self,
    member_id: MemberId,
  ) -> impl Future<Output = Result<Option<FacilitySession>, Self::Error>> + Send + '_;

  /// Atomically check the escort is active with at least one invitation,
  /// decrement the balance, and open a guest session under that escort.
  /// Either both writes happen or neither does.
  fn admit_guest(
    &self,
    escort_id: MemberId,
  ) -> impl Future<Output = Result<GuestEntry, Self::Error>> + Send + '_;

  /// Close an open guest session by pass id; `None` if not open.
  fn close_guest_session(
    &self,
    pass_id: Uuid,
  ) -> impl Future<Output = Result<Option<FacilitySession>, Self::Error>> + Send + '_;

  // ── Room sessions ─────────────────────────────────────────────────────

  /// Atomically read the room's capacity and open count and, if there is
  /// room, open a session for `subject`.
  fn try_open_room_session(
    &self,
    subject: SubjectRef,
    room_id: RoomId,
  ) -> impl Future<Output = Result<RoomEntry, Self::Error>> + Send + '_;

  /// Close the open session for (`subject`, `room_id`); `None` if none.
  fn close_room_session(
    &self,
    subject: SubjectRef,
    room_id: RoomId,
  ) -> impl Future<Output = Result<Option<RoomSession>, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Per-room and facility-wide open-session counts, from one consistent
  /// read.
  fn occupancy(
    &self,
  ) -> impl Future<Output = Result<OccupancyCounts, Self::Error>> + Send + '_;
}
