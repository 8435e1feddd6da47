//! [`AccessControl`], the decision core shared by every request handler.
//!
//! The struct only holds explicitly owned handles to the store and the
//! identity directory plus the policy; it keeps no mutable state between
//! requests. Operations are spread over the sibling modules:
//!
//! | Module | Operations |
//! |--------|------------|
//! | [`crate::admission`] | `decide_admission`, `close_guest_session` |
//! | [`crate::occupancy`] | `decide_room_movement`, `list_rooms` |
//! | [`crate::enrollment`] | `enroll`, `initialize_gallery`, `deactivate_member` |
//! | [`crate::stats`] | `snapshot` |

use std::sync::Arc;

use tracing::debug;

use crate::{
  Error, Result,
  directory::{DetectedFace, IdentityDirectory},
  policy::AccessPolicy,
  store::AccessStore,
};

pub struct AccessControl<S, D> {
  pub(crate) store:     Arc<S>,
  pub(crate) directory: Arc<D>,
  pub(crate) policy:    AccessPolicy,
}

impl<S, D> AccessControl<S, D>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  pub fn new(store: Arc<S>, directory: Arc<D>, policy: AccessPolicy) -> Self {
    Self { store, directory, policy }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn policy(&self) -> &AccessPolicy { &self.policy }

  /// Detect faces in `image` and insist on exactly one.
  ///
  /// Runs before any identification or persistence call, so a frame with
  /// zero or several people never has side effects.
  pub(crate) async fn detect_single_face(
    &self,
    image: &[u8],
  ) -> Result<DetectedFace> {
    let mut faces = self
      .directory
      .detect(image)
      .await
      .map_err(Error::identity_service)?;
    debug!(faces = faces.len(), "face detection finished");

    match faces.len() {
      0 => Err(Error::NoFaceDetected),
      1 => Ok(faces.remove(0)),
      n => Err(Error::MultipleFacesDetected(n)),
    }
  }
}
