//! JSON REST API for gym access control.
//!
//! Exposes axum [`Router`]s over any [`AccessControl`] instance, whatever its
//! store and identity directory. Authentication, TLS, CORS and transport
//! concerns are the caller's responsibility; [`admin_router`] is meant to be
//! mounted behind authentication.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", gym_api::api_router(access.clone()).merge(admin))
//! ```

pub mod error;
pub mod handlers;
pub mod image;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use gym_core::{AccessControl, directory::IdentityDirectory, store::AccessStore};

pub use error::ApiError;

use handlers::{access, admin, members, rooms, stats};

/// Base64 camera frames are large; allow up to 10 MiB per request.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Build the public API router: capture stations and the dashboard.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, D>(access: Arc<AccessControl<S, D>>) -> Router<()>
where
  S: AccessStore + 'static,
  D: IdentityDirectory + 'static,
{
  Router::new()
    // Enrollment
    .route("/members", post(members::enroll::<S, D>))
    // Facility
    .route("/access", post(access::decide::<S, D>))
    .route("/access/guests/{pass_id}/exit", post(access::guest_exit::<S, D>))
    // Rooms
    .route("/rooms", get(rooms::list::<S, D>))
    .route("/rooms/movements", post(rooms::movement::<S, D>))
    // Dashboard
    .route("/stats", get(stats::snapshot::<S, D>))
    .layer(DefaultBodyLimit::max(BODY_LIMIT))
    .with_state(access)
}

/// Build the administrative router, mounted under `/admin`.
pub fn admin_router<S, D>(access: Arc<AccessControl<S, D>>) -> Router<()>
where
  S: AccessStore + 'static,
  D: IdentityDirectory + 'static,
{
  Router::new()
    .route("/admin/gallery", post(admin::initialize_gallery::<S, D>))
    .route(
      "/admin/members/{id}/deactivate",
      post(admin::deactivate_member::<S, D>),
    )
    .with_state(access)
}
