//! SQLite backend for the gym access-control store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every check-then-write operation runs
//! inside one `BEGIN IMMEDIATE` transaction, so capacity and invitation
//! checks stay correct even with several processes sharing the file.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
