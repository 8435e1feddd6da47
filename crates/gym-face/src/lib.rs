//! HTTP client for an Azure-Face-style person-group API, implementing
//! [`gym_core::directory::IdentityDirectory`].
//!
//! One person group is the gallery; each enrolled member is a person in it.

mod client;
mod config;
mod wire;

pub mod error;

pub use client::FaceClient;
pub use config::DirectoryConfig;
pub use error::{Error, Result};
