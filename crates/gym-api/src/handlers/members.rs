//! `POST /members`: enroll a new member with a face image.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
};
use gym_core::{
  directory::IdentityDirectory,
  enrollment::EnrollmentRequest,
  member::{IdentityRef, MemberId},
  store::AccessStore,
};
use serde::{Deserialize, Serialize};

use super::Shared;
use crate::{error::ApiError, image::decode_image};

#[derive(Debug, Deserialize)]
pub struct EnrollBody {
  #[serde(default)]
  pub name:  String,
  #[serde(default)]
  pub email: String,
  pub phone: Option<String>,
  /// Base64, optionally as a `data:` URL.
  #[serde(default)]
  pub image: String,
}

#[derive(Debug, Serialize)]
pub struct EnrolledMember {
  pub id:    MemberId,
  pub name:  String,
  pub email: String,
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
  pub member:       EnrolledMember,
  pub identity_ref: IdentityRef,
}

/// `POST /members` with `{name, email, phone?, image}`; 201 on success.
pub async fn enroll<S, D>(
  State(access): Shared<S, D>,
  body: Result<Json<EnrollBody>, JsonRejection>,
) -> Result<(StatusCode, Json<EnrollResponse>), ApiError>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  let Json(body) = body?;
  let request = EnrollmentRequest {
    name:  body.name,
    email: body.email,
    phone: body.phone,
    image: decode_image(&body.image)?,
  };

  let enrollment = access.enroll(request).await?;
  Ok((
    StatusCode::CREATED,
    Json(EnrollResponse {
      member:       EnrolledMember {
        id:    enrollment.member.member_id,
        name:  enrollment.member.name,
        email: enrollment.member.email,
      },
      identity_ref: enrollment.identity_ref,
    }),
  ))
}
