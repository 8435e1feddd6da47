//! Core types, trait definitions and decision logic for gym access control.
//!
//! This crate has no HTTP or database dependencies. The
//! store and the face-recognition backend are reached only through the
//! [`store::AccessStore`] and [`directory::IdentityDirectory`] traits; the
//! decisions themselves live on [`service::AccessControl`].

// Trait methods spell out `impl Future + Send`; implementors write `async fn`.
#![allow(async_fn_in_trait)]

pub mod admission;
pub mod directory;
pub mod enrollment;
pub mod error;
pub mod member;
pub mod occupancy;
pub mod policy;
pub mod room;
pub mod service;
pub mod session;
pub mod stats;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result};
pub use service::AccessControl;
