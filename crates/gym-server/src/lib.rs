//! Gym access-control server: configuration, admin auth and router assembly.
//!
//! The binary in `main.rs` loads [`ServerConfig`], opens the SQLite store,
//! builds the face client and serves [`router`].

pub mod auth;
pub mod error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  http::{HeaderValue, Method, header, header::InvalidHeaderValue},
  middleware,
};
use gym_core::{
  AccessControl, directory::IdentityDirectory, policy::AccessPolicy, room::NewRoom,
  store::AccessStore,
};
use gym_face::DirectoryConfig;
use serde::Deserialize;
use tower_http::{
  cors::{AllowOrigin, Any, CorsLayer},
  trace::TraceLayer,
};
use tracing::info;

use auth::{AuthConfig, require_auth};

pub use error::Error;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `gym.toml` and `GYM_*`
/// environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
  /// Browser origins allowed to call the API; `*` allows any.
  #[serde(default)]
  pub cors_origins:       Vec<String>,
  #[serde(default)]
  pub policy:             AccessPolicy,
  pub directory:          DirectoryConfig,
  /// Rooms created or updated at startup, matched by name.
  #[serde(default)]
  pub rooms:              Vec<NewRoom>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/gym/gym.db") }

// ─── Startup ─────────────────────────────────────────────────────────────────

/// Upsert every configured room.
pub async fn seed_rooms<S: AccessStore>(store: &S, rooms: &[NewRoom]) -> Result<(), S::Error> {
  for room in rooms {
    let room = store.upsert_room(room.clone()).await?;
    info!(
      room_id = room.room_id,
      name = %room.name,
      max_occupancy = room.max_occupancy,
      active = room.active,
      "room configured"
    );
  }
  Ok(())
}

/// CORS policy for the browser capture UI and dashboard.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, InvalidHeaderValue> {
  let allow_origin = if origins.iter().any(|o| o == "*") {
    AllowOrigin::from(Any)
  } else {
    AllowOrigin::list(
      origins
        .iter()
        .map(|o| HeaderValue::from_str(o))
        .collect::<Result<Vec<_>, _>>()?,
    )
  };
  Ok(
    CorsLayer::new()
      .allow_origin(allow_origin)
      .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
      .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
      .max_age(Duration::from_secs(60 * 60)),
  )
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router: the public API, the admin API behind
/// Basic auth, request tracing and CORS.
pub fn router<S, D>(
  access: Arc<AccessControl<S, D>>,
  auth: Arc<AuthConfig>,
  cors: CorsLayer,
) -> Router
where
  S: AccessStore + 'static,
  D: IdentityDirectory + 'static,
{
  let admin = gym_api::admin_router(access.clone())
    .layer(middleware::from_fn_with_state(auth, require_auth));

  Router::new()
    .nest("/api", gym_api::api_router(access).merge(admin))
    .layer(TraceLayer::new_for_http())
    .layer(cors)
}

#[cfg(test)]
mod tests {
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{body::Body, http::{Request, StatusCode}};
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use gym_core::testing::{MemoryStore, StubDirectory};
  use rand_core::OsRng;
  use tower::ServiceExt as _;

  use super::*;

  fn make_router(origins: &[&str]) -> (Router, Arc<MemoryStore>) {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(b"secret", &salt)
      .unwrap()
      .to_string();
    let auth = Arc::new(AuthConfig { username: "admin".into(), password_hash: hash });

    let store = Arc::new(MemoryStore::new());
    let access = Arc::new(AccessControl::new(
      store.clone(),
      Arc::new(StubDirectory::new()),
      AccessPolicy::default(),
    ));
    let origins: Vec<String> = origins.iter().map(|o| o.to_string()).collect();
    (router(access, auth, cors_layer(&origins).unwrap()), store)
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot(app: &Router, req: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(req).await.unwrap()
  }

  #[tokio::test]
  async fn admin_routes_require_credentials() {
    let (app, _) = make_router(&[]);

    let req = Request::post("/api/admin/gallery").body(Body::empty()).unwrap();
    let resp = oneshot(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let req = Request::post("/api/admin/gallery")
      .header(header::AUTHORIZATION, basic("admin", "wrong"))
      .body(Body::empty())
      .unwrap();
    assert_eq!(oneshot(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = Request::post("/api/admin/gallery")
      .header(header::AUTHORIZATION, basic("admin", "secret"))
      .body(Body::empty())
      .unwrap();
    assert_eq!(oneshot(&app, req).await.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn public_routes_need_no_credentials() {
    let (app, store) = make_router(&[]);
    seed_rooms(
      store.as_ref(),
      &[NewRoom { name: "Pool".into(), max_occupancy: 8, active: true }],
    )
    .await
    .unwrap();

    let req = Request::get("/api/rooms").body(Body::empty()).unwrap();
    let resp = oneshot(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let rooms: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(rooms[0]["name"], "Pool");
    assert_eq!(rooms[0]["max_occupancy"], 8);
  }

  #[tokio::test]
  async fn seeding_twice_updates_in_place() {
    let (_, store) = make_router(&[]);
    let room = |capacity| NewRoom { name: "Pool".into(), max_occupancy: capacity, active: true };
    seed_rooms(store.as_ref(), &[room(8)]).await.unwrap();
    seed_rooms(store.as_ref(), &[room(12)]).await.unwrap();

    let rooms = store.list_active_rooms().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].max_occupancy, 12);
  }

  #[tokio::test]
  async fn cors_preflight_allows_configured_origin() {
    let (app, _) = make_router(&["http://kiosk.local"]);
    let req = Request::builder()
      .method(Method::OPTIONS)
      .uri("/api/access")
      .header(header::ORIGIN, "http://kiosk.local")
      .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
      .body(Body::empty())
      .unwrap();
    let resp = oneshot(&app, req).await;
    assert_eq!(
      resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
      "http://kiosk.local"
    );

    let req = Request::builder()
      .method(Method::OPTIONS)
      .uri("/api/access")
      .header(header::ORIGIN, "http://evil.example")
      .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
      .body(Body::empty())
      .unwrap();
    let resp = oneshot(&app, req).await;
    assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
  }

  #[test]
  fn invalid_origin_is_rejected() {
    assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
  }
}
