//! Occupancy statistics for the dashboard. Read-only.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  AccessControl, Error, Result,
  directory::IdentityDirectory,
  room::RoomId,
  store::{AccessStore, RoomOccupancy},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomStats {
  pub room_id:      RoomId,
  pub room:         String,
  pub occupied:     u32,
  pub capacity:     u32,
  pub free_slots:   u32,
  /// Percentage of capacity in use, one decimal place.
  pub pct_occupied: f64,
}

impl From<RoomOccupancy> for RoomStats {
  fn from(o: RoomOccupancy) -> Self {
    let capacity = o.room.max_occupancy;
    let pct_occupied = if capacity == 0 {
      0.0
    } else {
      (f64::from(o.occupied) * 1000.0 / f64::from(capacity)).round() / 10.0
    };
    Self {
      room_id: o.room.room_id,
      room: o.room.name,
      occupied: o.occupied,
      capacity,
      free_slots: capacity.saturating_sub(o.occupied),
      pct_occupied,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
  pub members_inside: u32,
  pub guests_inside:  u32,
  pub total_inside:   u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
  pub taken_at: DateTime<Utc>,
  pub per_room: Vec<RoomStats>,
  pub totals:   Totals,
}

impl<S, D> AccessControl<S, D>
where
  S: AccessStore,
  D: IdentityDirectory,
{
  /// Current occupancy per room plus facility-wide totals, derived from a
  /// single consistent store read.
  pub async fn snapshot(&self) -> Result<Snapshot> {
    let counts = self.store.occupancy().await.map_err(Error::store)?;
    Ok(Snapshot {
      taken_at: counts.taken_at,
      per_room: counts.rooms.into_iter().map(RoomStats::from).collect(),
      totals:   Totals {
        members_inside: counts.members_inside,
        guests_inside:  counts.guests_inside,
        total_inside:   counts.members_inside + counts.guests_inside,
      },
    })
  }
}
