//! Member enrollment and the administrative gallery/member operations.
//!
//! Enrollment spans two systems with no shared transaction: the directory
//! identity is created first, then the member row. Failures up to and
//! including the member insert delete the directory identity again. Once the
//! row exists it is kept even if training then fails; the face is attached,
//! so the member becomes recognisable after the next successful training.

use serde::Serialize;
use tracing::{info, warn};

use crate::{
  AccessControl, Error, Result,
  directory::{GalleryStatus, IdentityDirectory, TrainingStatus},
  member::{IdentityRef, Member, MemberId, NewMember},
  store::AccessStore,
};

/// Input to [`AccessControl::enroll`].
#[derive(Debug, Clone, Default)]
pub struct EnrollmentRequest {
  pub name:  String,
  pub email: String,
  pub phone: Option<String>,
  pub image: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrollment {
  pub member:       Member,
  pub identity_ref: IdentityRef,
}

impl<S, D> AccessControl<S, D>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  /// Register a new member with the face in `request.image`.
  pub async fn enroll(&self, request: EnrollmentRequest) -> Result<Enrollment> {
    let name = request.name.trim();
    let email = request.email.trim();
    if name.is_empty() || email.is_empty() || request.image.is_empty() {
      return Err(Error::InvalidInput("name, email and image are required".into()));
    }
    let phone = request
      .phone
      .as_deref()
      .map(str::trim)
      .filter(|p| !p.is_empty())
      .map(str::to_owned);

    self.detect_single_face(&request.image).await?;

    let identity = self
      .directory
      .create_identity(name)
      .await
      .map_err(|e| Error::DirectoryCreateFailed(Box::new(e)))?;

    if let Err(e) = self.directory.add_face(&identity, &request.image).await {
      self.discard_identity(&identity).await;
      return Err(Error::DirectoryEnrollFailed(Box::new(e)));
    }

    let new_member = NewMember {
      name:              name.to_owned(),
      email:             email.to_owned(),
      phone,
      identity_ref:      identity.clone(),
      guest_invitations: self.policy.default_guest_invitations,
    };
    let member = match self.store.insert_member(new_member).await {
      Ok(member) => member,
      Err(e) => {
        self.discard_identity(&identity).await;
        return Err(Error::store(e));
      }
    };
    info!(member_id = member.member_id, %identity, "member enrolled");

    self.train_gallery().await.map_err(|e| match e {
      Error::TrainingFailed(reason) => Error::TrainingFailed(format!(
        "member {} saved but not yet recognisable: {reason}",
        member.member_id
      )),
      other => other,
    })?;

    Ok(Enrollment { member, identity_ref: identity })
  }

  /// Rebuild the gallery and wait, bounded by the policy's poll budget, for
  /// the directory to report a terminal status.
  async fn train_gallery(&self) -> Result<()> {
    let fail = |e: D::Error| Error::TrainingFailed(e.to_string());

    self.directory.start_training().await.map_err(fail)?;

    for _ in 0..self.policy.training_max_polls {
      tokio::time::sleep(self.policy.training_poll_interval()).await;
      match self.directory.training_status().await.map_err(fail)? {
        TrainingStatus::Succeeded => return Ok(()),
        TrainingStatus::Failed(message) => {
          return Err(Error::TrainingFailed(
            message.unwrap_or_else(|| "directory reported failure".into()),
          ));
        }
        TrainingStatus::NotStarted | TrainingStatus::Running => {}
      }
    }

    Err(Error::TrainingFailed(format!(
      "still running after {} polls",
      self.policy.training_max_polls
    )))
  }

  /// Best-effort compensation for an enrollment that failed half way.
  async fn discard_identity(&self, identity: &IdentityRef) {
    if let Err(e) = self.directory.delete_identity(identity).await {
      warn!(%identity, error = %e, "failed to delete orphaned directory identity");
    }
  }

  /// Create the face gallery; safe to call repeatedly.
  pub async fn initialize_gallery(&self) -> Result<GalleryStatus> {
    let status = self
      .directory
      .ensure_gallery()
      .await
      .map_err(Error::identity_service)?;
    info!(?status, "gallery initialised");
    Ok(status)
  }

  pub async fn deactivate_member(&self, member_id: MemberId) -> Result<()> {
    if self
      .store
      .deactivate_member(member_id)
      .await
      .map_err(Error::store)?
    {
      info!(member_id, "member deactivated");
      Ok(())
    } else {
      Err(Error::MemberNotFound(format!("member {member_id}")))
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::{
    admission::{Admission, AdmissionRequest},
    policy::AccessPolicy,
    session::Direction,
    testing::{MemoryStore, StubDirectory, TrainingOutcome},
  };

  const FACE: &[u8] = b"bob-face";

  fn setup() -> (
    AccessControl<MemoryStore, StubDirectory>,
    Arc<MemoryStore>,
    Arc<StubDirectory>,
  ) {
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(StubDirectory::new());
    let policy = AccessPolicy {
      training_poll_interval_ms: 1,
      training_max_polls: 5,
      default_guest_invitations: 2,
      ..AccessPolicy::default()
    };
    (
      AccessControl::new(store.clone(), directory.clone(), policy),
      store,
      directory,
    )
  }

  fn request() -> EnrollmentRequest {
    EnrollmentRequest {
      name:  "Bob Marley".into(),
      email: "bob@example.com".into(),
      phone: Some("  ".into()),
      image: FACE.to_vec(),
    }
  }

  #[tokio::test]
  async fn enrolled_member_is_identified_at_the_gate() {
    let (access, _, _) = setup();
    let enrollment = access.enroll(request()).await.unwrap();
    assert_eq!(enrollment.member.name, "Bob Marley");
    assert_eq!(enrollment.member.phone, None);
    assert_eq!(enrollment.member.guest_invitations, 2);
    assert!(enrollment.member.active);

    let admission = access
      .decide_admission(AdmissionRequest {
        image: FACE.to_vec(),
        direction: Some(Direction::Enter),
        ..Default::default()
      })
      .await
      .unwrap();
    match admission {
      Admission::Member { member, confidence, .. } => {
        assert_eq!(member.member_id, enrollment.member.member_id);
        assert!(confidence >= access.policy().confidence_threshold);
      }
      other => panic!("expected member admission, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn blank_fields_are_invalid_input() {
    let (access, _, directory) = setup();
    let mut req = request();
    req.email = "   ".into();
    let err = access.enroll(req).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(directory.detect_calls(), 0);
  }

  #[tokio::test]
  async fn face_count_is_checked_before_any_directory_write() {
    let (access, store, directory) = setup();
    directory.set_face_count(FACE, 3);
    let err = access.enroll(request()).await.unwrap_err();
    assert!(matches!(err, Error::MultipleFacesDetected(3)));
    assert_eq!(directory.create_calls(), 0);
    assert_eq!(store.writes(), 0);
  }

  #[tokio::test]
  async fn detect_failure_writes_nothing() {
    let (access, store, directory) = setup();
    directory.set_fail_detect(true);
    let err = access.enroll(request()).await.unwrap_err();
    assert!(matches!(err, Error::IdentityService(_)));
    assert_eq!(err.code(), "IDENTITY_SERVICE_ERROR");
    assert_eq!(directory.create_calls(), 0);
    assert_eq!(store.writes(), 0);
  }

  #[tokio::test]
  async fn create_failure_is_reported() {
    let (access, store, directory) = setup();
    directory.set_fail_create(true);
    let err = access.enroll(request()).await.unwrap_err();
    assert!(matches!(err, Error::DirectoryCreateFailed(_)));
    assert_eq!(store.writes(), 0);
  }

  #[tokio::test]
  async fn attach_failure_discards_the_identity() {
    let (access, store, directory) = setup();
    directory.set_fail_add_face(true);
    let err = access.enroll(request()).await.unwrap_err();
    assert!(matches!(err, Error::DirectoryEnrollFailed(_)));
    assert_eq!(directory.deleted().len(), 1);
    assert_eq!(store.writes(), 0);
  }

  #[tokio::test]
  async fn store_failure_discards_the_identity() {
    let (access, store, directory) = setup();
    store.set_fail_writes(true);
    let err = access.enroll(request()).await.unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    assert_eq!(directory.deleted().len(), 1);
  }

  #[tokio::test]
  async fn training_failure_keeps_the_member() {
    let (access, store, directory) = setup();
    directory.set_training(TrainingOutcome::Fail);
    let err = access.enroll(request()).await.unwrap_err();
    assert!(matches!(err, Error::TrainingFailed(_)));
    assert_eq!(store.member_count(), 1);
    assert!(directory.deleted().is_empty());
  }

  #[tokio::test]
  async fn training_that_never_finishes_times_out() {
    let (access, _, directory) = setup();
    directory.set_training(TrainingOutcome::NeverFinish);
    let err = access.enroll(request()).await.unwrap_err();
    match err {
      Error::TrainingFailed(reason) => assert!(reason.contains("5 polls"), "{reason}"),
      other => panic!("expected training failure, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn gallery_initialisation_is_idempotent() {
    let (access, _, _) = setup();
    assert_eq!(access.initialize_gallery().await.unwrap(), GalleryStatus::Created);
    assert_eq!(
      access.initialize_gallery().await.unwrap(),
      GalleryStatus::AlreadyExisted
    );
  }

  #[tokio::test]
  async fn deactivating_unknown_member_is_not_found() {
    let (access, _, _) = setup();
    let err = access.deactivate_member(42).await.unwrap_err();
    assert!(matches!(err, Error::MemberNotFound(_)));
  }
}
