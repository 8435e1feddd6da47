//! Handler for the `/stats` endpoint.

use axum::{Json, extract::State};
use gym_core::{directory::IdentityDirectory, stats::Snapshot, store::AccessStore};

use super::Shared;
use crate::error::ApiError;

/// `GET /stats`: live occupancy for the dashboard.
pub async fn snapshot<S, D>(State(access): Shared<S, D>) -> Result<Json<Snapshot>, ApiError>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  Ok(Json(access.snapshot().await?))
}
