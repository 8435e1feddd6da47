//! Request handlers, one module per resource.

use std::sync::Arc;

use axum::extract::State;
use gym_core::AccessControl;

pub mod access;
pub mod admin;
pub mod members;
pub mod rooms;
pub mod stats;

/// State shared by every handler.
pub type Shared<S, D> = State<Arc<AccessControl<S, D>>>;
