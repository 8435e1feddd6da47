//! Rooms: static reference data with a concurrent occupancy cap.

use serde::{Deserialize, Serialize};

pub type RoomId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
  pub room_id:       RoomId,
  pub name:          String,
  pub max_occupancy: u32,
  pub active:        bool,
}

/// Input to [`crate::store::AccessStore::upsert_room`]; rooms are keyed by
/// name.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRoom {
  pub name:          String,
  pub max_occupancy: u32,
  #[serde(default = "default_active")]
  pub active:        bool,
}

fn default_active() -> bool { true }
