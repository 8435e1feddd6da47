//! Facility admission by face, and guest pass exit.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/access` | Body: `{image, direction, is_guest?, escort_member_id?}` |
//! | `POST` | `/access/guests/{pass_id}/exit` | 404 if the pass is not open |

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
};
use gym_core::{
  admission::{Admission, AdmissionRequest},
  directory::IdentityDirectory,
  member::MemberId,
  session::{Direction, FacilitySession},
  store::AccessStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Shared;
use crate::{error::ApiError, image::decode_image};

#[derive(Debug, Deserialize)]
pub struct AccessBody {
  #[serde(default)]
  pub image:            String,
  pub direction:        Option<Direction>,
  #[serde(default)]
  pub is_guest:         bool,
  pub escort_member_id: Option<MemberId>,
}

/// `POST /access`
pub async fn decide<S, D>(
  State(access): Shared<S, D>,
  body: Result<Json<AccessBody>, JsonRejection>,
) -> Result<Json<Admission>, ApiError>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  let Json(body) = body?;
  let request = AdmissionRequest {
    image:            decode_image(&body.image)?,
    direction:        body.direction,
    is_guest:         body.is_guest,
    escort_member_id: body.escort_member_id,
  };
  Ok(Json(access.decide_admission(request).await?))
}

#[derive(Debug, Serialize)]
pub struct GuestExit {
  pub session: FacilitySession,
}

/// `POST /access/guests/{pass_id}/exit`
pub async fn guest_exit<S, D>(
  State(access): Shared<S, D>,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<GuestExit>, ApiError>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  let Path(pass_id) = path?;
  let session = access.close_guest_session(pass_id).await?;
  Ok(Json(GuestExit { session }))
}
