//! Handlers for `/rooms` endpoints.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use gym_core::{
  directory::IdentityDirectory,
  occupancy::{RoomMovement, RoomMovementRequest},
  room::{Room, RoomId},
  session::{Direction, SubjectRef},
  store::AccessStore,
};
use serde::Deserialize;

use super::Shared;
use crate::error::ApiError;

/// `GET /rooms`: active rooms ordered by name.
pub async fn list<S, D>(State(access): Shared<S, D>) -> Result<Json<Vec<Room>>, ApiError>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  Ok(Json(access.list_rooms().await?))
}

/// Missing fields are passed through so the core reports them uniformly.
#[derive(Debug, Deserialize)]
pub struct MovementBody {
  pub subject:   Option<SubjectRef>,
  pub room_id:   Option<RoomId>,
  pub direction: Option<Direction>,
}

/// `POST /rooms/movements` with
/// `{"subject": {"kind": "member", "member_id": 1}, "room_id": 2, "direction": "ENTER"}`
pub async fn movement<S, D>(
  State(access): Shared<S, D>,
  body: Result<Json<MovementBody>, JsonRejection>,
) -> Result<Json<RoomMovement>, ApiError>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  let Json(body) = body?;
  let request = RoomMovementRequest {
    subject:   body.subject,
    room_id:   body.room_id,
    direction: body.direction,
  };
  Ok(Json(access.decide_room_movement(request).await?))
}
