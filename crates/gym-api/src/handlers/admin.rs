//! Administrative operations. Mounted behind authentication by the server.

use axum::{
  Json,
  extract::{Path, State, rejection::PathRejection},
  http::StatusCode,
};
use gym_core::{
  directory::{GalleryStatus, IdentityDirectory},
  member::MemberId,
  store::AccessStore,
};
use serde::Serialize;

use super::Shared;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
  pub status: GalleryStatus,
}

/// `POST /admin/gallery`: create the face gallery if it is missing.
pub async fn initialize_gallery<S, D>(
  State(access): Shared<S, D>,
) -> Result<Json<GalleryResponse>, ApiError>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  let status = access.initialize_gallery().await?;
  Ok(Json(GalleryResponse { status }))
}

/// `POST /admin/members/{id}/deactivate`; 204 on success.
pub async fn deactivate_member<S, D>(
  State(access): Shared<S, D>,
  path: Result<Path<MemberId>, PathRejection>,
) -> Result<StatusCode, ApiError>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  let Path(id) = path?;
  access.deactivate_member(id).await?;
  Ok(StatusCode::NO_CONTENT)
}
