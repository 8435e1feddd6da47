//! Room occupancy: capacity-checked room entry and dwell-time on exit.
//!
//! A subject may currently be open in several rooms at once; only the
//! per-room cap and the one-session-per-(subject, room) rule are enforced.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  AccessControl, Error, Result,
  directory::IdentityDirectory,
  room::{Room, RoomId},
  session::{Direction, SubjectRef},
  store::{AccessStore, RoomEntry},
};

/// Input to [`AccessControl::decide_room_movement`].
#[derive(Debug, Clone, Default)]
pub struct RoomMovementRequest {
  pub subject:   Option<SubjectRef>,
  pub room_id:   Option<RoomId>,
  pub direction: Option<Direction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "direction")]
pub enum RoomMovement {
  #[serde(rename = "ENTER")]
  Entered {
    session_id:         Uuid,
    remaining_capacity: u32,
    occupied:           u32,
    capacity:           u32,
  },
  #[serde(rename = "EXIT")]
  Exited {
    session_id:    Uuid,
    dwell_minutes: i64,
  },
}

impl<S, D> AccessControl<S, D>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  pub async fn decide_room_movement(
    &self,
    request: RoomMovementRequest,
  ) -> Result<RoomMovement> {
    let (Some(subject), Some(room_id), Some(direction)) =
      (request.subject, request.room_id, request.direction)
    else {
      return Err(Error::InvalidInput(
        "subject, room_id and direction are required".into(),
      ));
    };

    match direction {
      Direction::Enter => self.enter_room(subject, room_id).await,
      Direction::Exit => self.exit_room(subject, room_id).await,
    }
  }

  async fn enter_room(
    &self,
    subject: SubjectRef,
    room_id: RoomId,
  ) -> Result<RoomMovement> {
    match self
      .store
      .try_open_room_session(subject, room_id)
      .await
      .map_err(Error::store)?
    {
      RoomEntry::Entered { session, occupied_before, capacity } => {
        let remaining_capacity =
          capacity.saturating_sub(occupied_before).saturating_sub(1);
        info!(room_id, ?subject, remaining_capacity, "room entry");
        Ok(RoomMovement::Entered {
          session_id: session.session_id,
          remaining_capacity,
          occupied: occupied_before + 1,
          capacity,
        })
      }
      RoomEntry::RoomNotFound => Err(Error::RoomNotFound(room_id)),
      RoomEntry::UnknownSubject => {
        warn!(room_id, ?subject, "room entry by unknown subject");
        Err(match subject {
          SubjectRef::Member { member_id } => {
            Error::MemberNotFound(format!("member {member_id}"))
          }
          SubjectRef::Guest { pass_id } => {
            Error::NoOpenSession(format!("no guest inside with pass {pass_id}"))
          }
        })
      }
      RoomEntry::Full { occupied, capacity } => {
        warn!(room_id, occupied, capacity, "room full");
        Err(Error::RoomFull { occupied, capacity })
      }
      RoomEntry::AlreadyInside(session) => Err(Error::SessionStateConflict(
        format!("already inside room {room_id} since {}", session.opened_at),
      )),
    }
  }

  async fn exit_room(
    &self,
    subject: SubjectRef,
    room_id: RoomId,
  ) -> Result<RoomMovement> {
    let session = self
      .store
      .close_room_session(subject, room_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::NoOpenSession(format!("no entry recorded in room {room_id}"))
      })?;

    let dwell_minutes = session.dwell_minutes().unwrap_or(0);
    info!(room_id, ?subject, dwell_minutes, "room exit");
    Ok(RoomMovement::Exited { session_id: session.session_id, dwell_minutes })
  }

  /// Active rooms, for a capture station's room selector.
  pub async fn list_rooms(&self) -> Result<Vec<Room>> {
    self.store.list_active_rooms().await.map_err(Error::store)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::{
    member::IdentityRef,
    policy::AccessPolicy,
    room::NewRoom,
    store::GuestEntry,
    testing::{MemoryStore, StubDirectory},
  };

  /// A room of `capacity` and four enrolled members, ids 1 to 4.
  async fn setup(capacity: u32) -> (AccessControl<MemoryStore, StubDirectory>, Room) {
    let store = Arc::new(MemoryStore::new());
    for name in ["Ann", "Ben", "Cat", "Dan"] {
      store
        .seed_member(name, IdentityRef(format!("person-{name}")), 1)
        .await;
    }
    let room = store
      .upsert_room(NewRoom {
        name:          "Spinning".into(),
        max_occupancy: capacity,
        active:        true,
      })
      .await
      .unwrap();
    let access = AccessControl::new(
      store,
      Arc::new(StubDirectory::new()),
      AccessPolicy::default(),
    );
    (access, room)
  }

  fn member(member_id: i64) -> SubjectRef { SubjectRef::Member { member_id } }

  fn movement(
    subject: SubjectRef,
    room: &Room,
    direction: Direction,
  ) -> RoomMovementRequest {
    RoomMovementRequest {
      subject:   Some(subject),
      room_id:   Some(room.room_id),
      direction: Some(direction),
    }
  }

  fn remaining(m: RoomMovement) -> u32 {
    match m {
      RoomMovement::Entered { remaining_capacity, .. } => remaining_capacity,
      other => panic!("expected entry, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn missing_fields_are_invalid_input() {
    let (access, _) = setup(2).await;
    let err = access
      .decide_room_movement(RoomMovementRequest {
        subject: Some(member(1)),
        ..Default::default()
      })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
  }

  #[tokio::test]
  async fn capacity_two_scenario() {
    let (access, room) = setup(2).await;

    let first = access
      .decide_room_movement(movement(member(1), &room, Direction::Enter))
      .await
      .unwrap();
    assert_eq!(remaining(first), 1);

    let second = access
      .decide_room_movement(movement(member(2), &room, Direction::Enter))
      .await
      .unwrap();
    assert_eq!(remaining(second), 0);

    let err = access
      .decide_room_movement(movement(member(3), &room, Direction::Enter))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::RoomFull { occupied: 2, capacity: 2 }));

    access
      .decide_room_movement(movement(member(1), &room, Direction::Exit))
      .await
      .unwrap();

    let refill = access
      .decide_room_movement(movement(member(3), &room, Direction::Enter))
      .await
      .unwrap();
    assert_eq!(remaining(refill), 0);

    let err = access
      .decide_room_movement(movement(member(4), &room, Direction::Enter))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::RoomFull { occupied: 2, capacity: 2 }));
  }

  #[tokio::test]
  async fn enter_then_exit_reports_dwell_and_closes() {
    let (access, room) = setup(5).await;
    access
      .decide_room_movement(movement(member(1), &room, Direction::Enter))
      .await
      .unwrap();

    let exit = access
      .decide_room_movement(movement(member(1), &room, Direction::Exit))
      .await
      .unwrap();
    match exit {
      RoomMovement::Exited { dwell_minutes, .. } => assert!(dwell_minutes >= 0),
      other => panic!("expected exit, got {other:?}"),
    }

    let err = access
      .decide_room_movement(movement(member(1), &room, Direction::Exit))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NoOpenSession(_)));
  }

  #[tokio::test]
  async fn exit_without_entry_is_no_open_session() {
    let (access, room) = setup(5).await;
    let err = access
      .decide_room_movement(movement(member(9), &room, Direction::Exit))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NoOpenSession(_)));
  }

  #[tokio::test]
  async fn double_entry_into_same_room_is_a_conflict() {
    let (access, room) = setup(5).await;
    access
      .decide_room_movement(movement(member(1), &room, Direction::Enter))
      .await
      .unwrap();
    let err = access
      .decide_room_movement(movement(member(1), &room, Direction::Enter))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::SessionStateConflict(_)));
  }

  #[tokio::test]
  async fn subject_may_be_inside_two_rooms() {
    let (access, spinning) = setup(5).await;
    let weights = access
      .store()
      .upsert_room(NewRoom {
        name:          "Weights".into(),
        max_occupancy: 5,
        active:        true,
      })
      .await
      .unwrap();

    access
      .decide_room_movement(movement(member(1), &spinning, Direction::Enter))
      .await
      .unwrap();
    access
      .decide_room_movement(movement(member(1), &weights, Direction::Enter))
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn unknown_or_inactive_room_is_not_found() {
    let (access, room) = setup(5).await;
    let err = access
      .decide_room_movement(RoomMovementRequest {
        subject:   Some(member(1)),
        room_id:   Some(room.room_id + 100),
        direction: Some(Direction::Enter),
      })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::RoomNotFound(_)));

    access
      .store()
      .upsert_room(NewRoom {
        name:          room.name.clone(),
        max_occupancy: 5,
        active:        false,
      })
      .await
      .unwrap();
    let err = access
      .decide_room_movement(movement(member(1), &room, Direction::Enter))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::RoomNotFound(_)));
    assert!(access.list_rooms().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn guests_enter_rooms_by_pass() {
    let (access, room) = setup(1).await;
    let GuestEntry::Admitted { session, .. } =
      access.store().admit_guest(1).await.unwrap()
    else {
      panic!("guest not admitted");
    };
    let guest = SubjectRef::Guest { pass_id: session.session_id };
    let entered = access
      .decide_room_movement(movement(guest, &room, Direction::Enter))
      .await
      .unwrap();
    assert_eq!(remaining(entered), 0);
  }

  #[tokio::test]
  async fn unknown_subjects_cannot_take_a_slot() {
    let (access, room) = setup(2).await;

    let err = access
      .decide_room_movement(movement(member(999), &room, Direction::Enter))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::MemberNotFound(_)));

    let stranger = SubjectRef::Guest { pass_id: Uuid::new_v4() };
    let err = access
      .decide_room_movement(movement(stranger, &room, Direction::Enter))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NoOpenSession(_)));

    access.store().deactivate_member(2).await.unwrap();
    let err = access
      .decide_room_movement(movement(member(2), &room, Direction::Enter))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::MemberNotFound(_)));

    let GuestEntry::Admitted { session, .. } =
      access.store().admit_guest(1).await.unwrap()
    else {
      panic!("guest not admitted");
    };
    access.close_guest_session(session.session_id).await.unwrap();
    let left = SubjectRef::Guest { pass_id: session.session_id };
    let err = access
      .decide_room_movement(movement(left, &room, Direction::Enter))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NoOpenSession(_)));

    let snap = access.snapshot().await.unwrap();
    assert_eq!(snap.per_room[0].occupied, 0);
  }
}
