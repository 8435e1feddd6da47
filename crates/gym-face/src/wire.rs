//! JSON bodies exchanged with the face service.

use gym_core::directory::FaceRectangle;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupBody<'a> {
  pub name:              &'a str,
  pub recognition_model: &'a str,
  pub user_data:         &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFace {
  pub face_id:        String,
  pub face_rectangle: Option<FaceRectangle>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyBody<'a> {
  pub face_ids:                       [&'a str; 1],
  pub person_group_id:                &'a str,
  pub max_num_of_candidates_returned: u32,
  pub confidence_threshold:           f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyResult {
  #[serde(default)]
  pub candidates: Vec<WireCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCandidate {
  pub person_id:  String,
  pub confidence: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePersonBody<'a> {
  pub name:      &'a str,
  pub user_data: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPerson {
  pub person_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedFace {
  pub persisted_face_id: String,
}

#[derive(Deserialize)]
pub struct WireTrainingStatus {
  pub status:  String,
  pub message: Option<String>,
}

/// `{"error": {"code": ..., "message": ...}}`
#[derive(Deserialize)]
pub struct ErrorBody {
  pub error: ErrorDetail,
}

#[derive(Deserialize)]
pub struct ErrorDetail {
  #[serde(default)]
  pub code:    String,
  #[serde(default)]
  pub message: String,
}
