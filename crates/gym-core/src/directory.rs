//! The `IdentityDirectory` trait, the external face-recognition capability.
//!
//! Implemented by `gym-face` against a cloud person-group API, and by
//! [`crate::testing::StubDirectory`] for deterministic tests. The decision
//! core never looks inside an image; it only sees face counts, face handles
//! and match candidates.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::member::IdentityRef;

// ─── Detection & identification ──────────────────────────────────────────────

/// Pixel rectangle of a detected face within the submitted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRectangle {
  pub top:    u32,
  pub left:   u32,
  pub width:  u32,
  pub height: u32,
}

/// A face found by [`IdentityDirectory::detect`]. The `face_id` is a
/// short-lived handle that can be passed to [`IdentityDirectory::identify`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
  pub face_id:   String,
  pub rectangle: Option<FaceRectangle>,
}

/// Best match for a face within the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
  pub identity:   IdentityRef,
  /// Match score in `[0, 1]`.
  pub confidence: f32,
}

// ─── Gallery lifecycle ───────────────────────────────────────────────────────

/// Outcome of [`IdentityDirectory::ensure_gallery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GalleryStatus {
  Created,
  AlreadyExisted,
}

/// Progress of the gallery rebuild started by
/// [`IdentityDirectory::start_training`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingStatus {
  NotStarted,
  Running,
  Succeeded,
  Failed(Option<String>),
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a face-recognition backend holding one gallery of
/// enrolled identities.
///
/// All methods return `Send` futures so implementations can be shared across
/// a multi-threaded runtime.
pub trait IdentityDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create the gallery if it does not exist yet.
  fn ensure_gallery(
    &self,
  ) -> impl Future<Output = Result<GalleryStatus, Self::Error>> + Send + '_;

  /// Find every face in `image`.
  fn detect<'a>(
    &'a self,
    image: &'a [u8],
  ) -> impl Future<Output = Result<Vec<DetectedFace>, Self::Error>> + Send + 'a;

  /// Return the best gallery match for `face` scoring at least `threshold`,
  /// or `None` if nobody does. "No match" is not an error.
  fn identify<'a>(
    &'a self,
    face: &'a DetectedFace,
    threshold: f32,
  ) -> impl Future<Output = Result<Option<Candidate>, Self::Error>> + Send + 'a;

  /// Create a new, face-less identity in the gallery.
  fn create_identity<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<IdentityRef, Self::Error>> + Send + 'a;

  /// Attach the face in `image` to `identity`; returns the persisted face id.
  fn add_face<'a>(
    &'a self,
    identity: &'a IdentityRef,
    image: &'a [u8],
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Remove an identity and its faces.
  fn delete_identity<'a>(
    &'a self,
    identity: &'a IdentityRef,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Kick off a gallery rebuild. Returns as soon as the rebuild is accepted.
  fn start_training(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn training_status(
    &self,
  ) -> impl Future<Output = Result<TrainingStatus, Self::Error>> + Send + '_;
}
