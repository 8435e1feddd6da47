//! In-memory test doubles for the store and the identity directory.
//!
//! Compiled for this crate's own tests and, through the `testing` feature,
//! for dependent crates' tests. [`MemoryStore`] keeps the same invariants as
//! a real backend by holding one lock across each check-then-write;
//! [`StubDirectory`] treats image bytes as a face's identity.

use std::{
  collections::HashMap,
  sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  directory::{Candidate, DetectedFace, GalleryStatus, IdentityDirectory, TrainingStatus},
  member::{IdentityRef, Member, MemberId, NewMember},
  room::{NewRoom, Room, RoomId},
  session::{FacilitySession, RoomSession, SubjectKind, SubjectRef},
  store::{AccessStore, FacilityEntry, GuestEntry, OccupancyCounts, RoomEntry, RoomOccupancy},
};

// ─── MemoryStore ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("memory store: {0}")]
pub struct MemoryStoreError(String);

#[derive(Default)]
struct StoreState {
  members:       Vec<Member>,
  rooms:         Vec<Room>,
  facility:      Vec<FacilitySession>,
  room_sessions: Vec<RoomSession>,
}

/// An [`AccessStore`] held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
  state:       Mutex<StoreState>,
  writes:      AtomicUsize,
  fail_writes: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn state(&self) -> MutexGuard<'_, StoreState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn begin_write(&self) -> Result<(), MemoryStoreError> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(MemoryStoreError("writes disabled".into()));
    }
    Ok(())
  }

  fn wrote(&self) { self.writes.fetch_add(1, Ordering::SeqCst); }

  /// Number of successful writes so far.
  pub fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

  /// Make every subsequent write fail with a backend error.
  pub fn set_fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  pub fn member_count(&self) -> usize { self.state().members.len() }

  /// Insert an active member linked to `identity`.
  pub async fn seed_member(
    &self,
    name: &str,
    identity: IdentityRef,
    guest_invitations: u32,
  ) -> Member {
    self
      .insert_member(NewMember {
        name: name.to_owned(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: None,
        identity_ref: identity,
        guest_invitations,
      })
      .await
      .expect("seed member")
  }
}

impl StoreState {
  fn active_member(&self, id: MemberId) -> Option<&Member> {
    self.members.iter().find(|m| m.member_id == id && m.active)
  }

  fn active_member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
    self.members.iter_mut().find(|m| m.member_id == id && m.active)
  }

  fn open_facility(&self, subject: SubjectRef) -> Option<usize> {
    self
      .facility
      .iter()
      .position(|s| s.subject == subject && s.is_open())
  }

  fn open_room(&self, subject: SubjectRef, room_id: RoomId) -> Option<usize> {
    self
      .room_sessions
      .iter()
      .position(|s| s.subject == subject && s.room_id == room_id && s.is_open())
  }
}

impl AccessStore for MemoryStore {
  type Error = MemoryStoreError;

  async fn insert_member(&self, input: NewMember) -> Result<Member, Self::Error> {
    self.begin_write()?;
    let mut state = self.state();
    if state.members.iter().any(|m| m.identity_ref == input.identity_ref) {
      return Err(MemoryStoreError(format!(
        "identity {} already linked",
        input.identity_ref
      )));
    }
    let member = Member {
      member_id:         state.members.len() as MemberId + 1,
      name:              input.name,
      email:             input.email,
      phone:             input.phone,
      identity_ref:      input.identity_ref,
      active:            true,
      guest_invitations: input.guest_invitations,
      created_at:        Utc::now(),
    };
    state.members.push(member.clone());
    self.wrote();
    Ok(member)
  }

  async fn get_member(&self, id: MemberId) -> Result<Option<Member>, Self::Error> {
    Ok(self.state().members.iter().find(|m| m.member_id == id).cloned())
  }

  async fn find_active_member_by_identity(
    &self,
    identity: &IdentityRef,
  ) -> Result<Option<Member>, Self::Error> {
    Ok(
      self
        .state()
        .members
        .iter()
        .find(|m| &m.identity_ref == identity && m.active)
        .cloned(),
    )
  }

  async fn deactivate_member(&self, id: MemberId) -> Result<bool, Self::Error> {
    self.begin_write()?;
    let mut state = self.state();
    let Some(member) = state.members.iter_mut().find(|m| m.member_id == id) else {
      return Ok(false);
    };
    member.active = false;
    self.wrote();
    Ok(true)
  }

  async fn upsert_room(&self, input: NewRoom) -> Result<Room, Self::Error> {
    self.begin_write()?;
    let mut state = self.state();
    let next_id = state.rooms.len() as RoomId + 1;
    let room = match state.rooms.iter_mut().find(|r| r.name == input.name) {
      Some(room) => {
        room.max_occupancy = input.max_occupancy;
        room.active = input.active;
        room.clone()
      }
      None => {
        let room = Room {
          room_id:       next_id,
          name:          input.name,
          max_occupancy: input.max_occupancy,
          active:        input.active,
        };
        state.rooms.push(room.clone());
        room
      }
    };
    self.wrote();
    Ok(room)
  }

  async fn list_active_rooms(&self) -> Result<Vec<Room>, Self::Error> {
    let mut rooms: Vec<Room> =
      self.state().rooms.iter().filter(|r| r.active).cloned().collect();
    rooms.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(rooms)
  }

  async fn open_member_session(
    &self,
    member_id: MemberId,
  ) -> Result<FacilityEntry, Self::Error> {
    self.begin_write()?;
    let mut state = self.state();
    let subject = SubjectRef::Member { member_id };
    if let Some(i) = state.open_facility(subject) {
      return Ok(FacilityEntry::AlreadyOpen(state.facility[i].clone()));
    }
    let session = FacilitySession {
      session_id: Uuid::new_v4(),
      subject,
      escort_id: None,
      opened_at: Utc::now(),
      closed_at: None,
    };
    state.facility.push(session.clone());
    self.wrote();
    Ok(FacilityEntry::Opened(session))
  }

  async fn close_member_session(
    &self,
    member_id: MemberId,
  ) -> Result<Option<FacilitySession>, Self::Error> {
    self.begin_write()?;
    let mut state = self.state();
    let Some(i) = state.open_facility(SubjectRef::Member { member_id }) else {
      return Ok(None);
    };
    state.facility[i].closed_at = Some(Utc::now());
    self.wrote();
    Ok(Some(state.facility[i].clone()))
  }

  async fn admit_guest(&self, escort_id: MemberId) -> Result<GuestEntry, Self::Error> {
    self.begin_write()?;
    let mut state = self.state();
    let Some(escort) = state.active_member_mut(escort_id) else {
      return Ok(GuestEntry::EscortNotFound);
    };
    if escort.guest_invitations == 0 {
      return Ok(GuestEntry::NoInvitationsLeft);
    }
    escort.guest_invitations -= 1;
    let escort = escort.clone();

    let pass_id = Uuid::new_v4();
    let session = FacilitySession {
      session_id: pass_id,
      subject:    SubjectRef::Guest { pass_id },
      escort_id:  Some(escort_id),
      opened_at:  Utc::now(),
      closed_at:  None,
    };
    state.facility.push(session.clone());
    self.wrote();
    Ok(GuestEntry::Admitted { session, escort })
  }

  async fn close_guest_session(
    &self,
    pass_id: Uuid,
  ) -> Result<Option<FacilitySession>, Self::Error> {
    self.begin_write()?;
    let mut state = self.state();
    let Some(i) = state.open_facility(SubjectRef::Guest { pass_id }) else {
      return Ok(None);
    };
    state.facility[i].closed_at = Some(Utc::now());
    self.wrote();
    Ok(Some(state.facility[i].clone()))
  }

  async fn try_open_room_session(
    &self,
    subject: SubjectRef,
    room_id: RoomId,
  ) -> Result<RoomEntry, Self::Error> {
    self.begin_write()?;
    let mut state = self.state();
    let Some(capacity) = state
      .rooms
      .iter()
      .find(|r| r.room_id == room_id && r.active)
      .map(|r| r.max_occupancy)
    else {
      return Ok(RoomEntry::RoomNotFound);
    };
    let known = match subject {
      SubjectRef::Member { member_id } => state.active_member(member_id).is_some(),
      SubjectRef::Guest { .. } => state.open_facility(subject).is_some(),
    };
    if !known {
      return Ok(RoomEntry::UnknownSubject);
    }
    if let Some(i) = state.open_room(subject, room_id) {
      return Ok(RoomEntry::AlreadyInside(state.room_sessions[i].clone()));
    }
    let occupied = state
      .room_sessions
      .iter()
      .filter(|s| s.room_id == room_id && s.is_open())
      .count() as u32;
    if occupied >= capacity {
      return Ok(RoomEntry::Full { occupied, capacity });
    }
    let session = RoomSession {
      session_id: Uuid::new_v4(),
      subject,
      room_id,
      opened_at: Utc::now(),
      closed_at: None,
    };
    state.room_sessions.push(session.clone());
    self.wrote();
    Ok(RoomEntry::Entered { session, occupied_before: occupied, capacity })
  }

  async fn close_room_session(
    &self,
    subject: SubjectRef,
    room_id: RoomId,
  ) -> Result<Option<RoomSession>, Self::Error> {
    self.begin_write()?;
    let mut state = self.state();
    let Some(i) = state.open_room(subject, room_id) else {
      return Ok(None);
    };
    state.room_sessions[i].closed_at = Some(Utc::now());
    self.wrote();
    Ok(Some(state.room_sessions[i].clone()))
  }

  async fn occupancy(&self) -> Result<OccupancyCounts, Self::Error> {
    let state = self.state();
    let mut rooms: Vec<RoomOccupancy> = state
      .rooms
      .iter()
      .filter(|r| r.active)
      .map(|room| RoomOccupancy {
        room:     room.clone(),
        occupied: state
          .room_sessions
          .iter()
          .filter(|s| s.room_id == room.room_id && s.is_open())
          .count() as u32,
      })
      .collect();
    rooms.sort_by(|a, b| a.room.name.cmp(&b.room.name));

    let inside = |kind: SubjectKind| {
      state
        .facility
        .iter()
        .filter(|s| s.is_open() && s.subject.kind() == kind)
        .count() as u32
    };
    Ok(OccupancyCounts {
      taken_at: Utc::now(),
      rooms,
      members_inside: inside(SubjectKind::Member),
      guests_inside: inside(SubjectKind::Guest),
    })
  }
}

// ─── StubDirectory ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("stub directory: {0}")]
pub struct StubError(String);

/// How [`StubDirectory`] answers training-status polls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrainingOutcome {
  /// Promote pending faces and report success.
  #[default]
  Succeed,
  Fail,
  NeverFinish,
}

struct StubState {
  gallery:          bool,
  /// Faces reported per image; images not listed show one face.
  face_counts:      HashMap<Vec<u8>, usize>,
  /// Detected face handles back to the image they came from.
  faces:            HashMap<String, Vec<u8>>,
  /// Faces attached but not yet trained.
  pending:          HashMap<Vec<u8>, IdentityRef>,
  trained:          HashMap<Vec<u8>, IdentityRef>,
  deleted:          Vec<IdentityRef>,
  match_confidence: f32,
  training:         TrainingOutcome,
  fail_detect:      bool,
  fail_identify:    bool,
  fail_create:      bool,
  fail_add_face:    bool,
  next_id:          usize,
  detect_calls:     usize,
  identify_calls:   usize,
  create_calls:     usize,
}

/// An [`IdentityDirectory`] that recognises an image byte-for-byte once a
/// face from it has been attached and trained.
pub struct StubDirectory {
  state: Mutex<StubState>,
}

impl Default for StubDirectory {
  fn default() -> Self { Self::new() }
}

impl StubDirectory {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(StubState {
        gallery:          false,
        face_counts:      HashMap::new(),
        faces:            HashMap::new(),
        pending:          HashMap::new(),
        trained:          HashMap::new(),
        deleted:          Vec::new(),
        match_confidence: 0.92,
        training:         TrainingOutcome::default(),
        fail_detect:      false,
        fail_identify:    false,
        fail_create:      false,
        fail_add_face:    false,
        next_id:          0,
        detect_calls:     0,
        identify_calls:   0,
        create_calls:     0,
      }),
    }
  }

  fn state(&self) -> MutexGuard<'_, StubState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register `image` as an already-trained identity and return it.
  pub fn enroll_face(&self, image: &[u8]) -> IdentityRef {
    let mut state = self.state();
    state.next_id += 1;
    let identity = IdentityRef(format!("person-{}", state.next_id));
    state.trained.insert(image.to_vec(), identity.clone());
    identity
  }

  pub fn set_face_count(&self, image: &[u8], count: usize) {
    self.state().face_counts.insert(image.to_vec(), count);
  }

  pub fn set_match_confidence(&self, confidence: f32) {
    self.state().match_confidence = confidence;
  }

  pub fn set_training(&self, outcome: TrainingOutcome) {
    self.state().training = outcome;
  }

  pub fn set_fail_detect(&self, fail: bool) { self.state().fail_detect = fail; }

  pub fn set_fail_identify(&self, fail: bool) { self.state().fail_identify = fail; }

  pub fn set_fail_create(&self, fail: bool) { self.state().fail_create = fail; }

  pub fn set_fail_add_face(&self, fail: bool) { self.state().fail_add_face = fail; }

  pub fn detect_calls(&self) -> usize { self.state().detect_calls }

  pub fn identify_calls(&self) -> usize { self.state().identify_calls }

  pub fn create_calls(&self) -> usize { self.state().create_calls }

  /// Identities removed through [`IdentityDirectory::delete_identity`].
  pub fn deleted(&self) -> Vec<IdentityRef> { self.state().deleted.clone() }
}

impl IdentityDirectory for StubDirectory {
  type Error = StubError;

  async fn ensure_gallery(&self) -> Result<GalleryStatus, Self::Error> {
    let mut state = self.state();
    if state.gallery {
      Ok(GalleryStatus::AlreadyExisted)
    } else {
      state.gallery = true;
      Ok(GalleryStatus::Created)
    }
  }

  async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, Self::Error> {
    let mut state = self.state();
    state.detect_calls += 1;
    if state.fail_detect {
      return Err(StubError("detect unavailable".into()));
    }
    let count = state.face_counts.get(image).copied().unwrap_or(1);
    let mut faces = Vec::with_capacity(count);
    for _ in 0..count {
      let face_id = Uuid::new_v4().to_string();
      state.faces.insert(face_id.clone(), image.to_vec());
      faces.push(DetectedFace { face_id, rectangle: None });
    }
    Ok(faces)
  }

  async fn identify(
    &self,
    face: &DetectedFace,
    _threshold: f32,
  ) -> Result<Option<Candidate>, Self::Error> {
    let mut state = self.state();
    state.identify_calls += 1;
    if state.fail_identify {
      return Err(StubError("identify unavailable".into()));
    }
    let image = state
      .faces
      .get(&face.face_id)
      .ok_or_else(|| StubError(format!("unknown face id {}", face.face_id)))?;
    Ok(state.trained.get(image).map(|identity| Candidate {
      identity:   identity.clone(),
      confidence: state.match_confidence,
    }))
  }

  async fn create_identity(&self, _name: &str) -> Result<IdentityRef, Self::Error> {
    let mut state = self.state();
    state.create_calls += 1;
    if state.fail_create {
      return Err(StubError("create unavailable".into()));
    }
    state.next_id += 1;
    Ok(IdentityRef(format!("person-{}", state.next_id)))
  }

  async fn add_face(
    &self,
    identity: &IdentityRef,
    image: &[u8],
  ) -> Result<String, Self::Error> {
    let mut state = self.state();
    if state.fail_add_face {
      return Err(StubError("add face unavailable".into()));
    }
    state.pending.insert(image.to_vec(), identity.clone());
    Ok(format!("face-of-{identity}"))
  }

  async fn delete_identity(&self, identity: &IdentityRef) -> Result<(), Self::Error> {
    let mut state = self.state();
    state.pending.retain(|_, id| id != identity);
    state.trained.retain(|_, id| id != identity);
    state.deleted.push(identity.clone());
    Ok(())
  }

  async fn start_training(&self) -> Result<(), Self::Error> { Ok(()) }

  async fn training_status(&self) -> Result<TrainingStatus, Self::Error> {
    let mut state = self.state();
    Ok(match state.training {
      TrainingOutcome::Succeed => {
        let pending = std::mem::take(&mut state.pending);
        state.trained.extend(pending);
        TrainingStatus::Succeeded
      }
      TrainingOutcome::Fail => TrainingStatus::Failed(Some("stub training failure".into())),
      TrainingOutcome::NeverFinish => TrainingStatus::Running,
    })
  }
}
