//! HTTP Basic auth for the administrative routes.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use tracing::warn;

use crate::error::Error;

/// Credentials accepted for the admin routes.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Check the `Authorization: Basic` header against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Error> {
  let (username, password) =
    basic_credentials(headers).ok_or(Error::Unauthorized)?;

  let hash = PasswordHash::new(&config.password_hash)
    .map_err(|_| Error::Unauthorized)?;
  let password_ok = Argon2::default()
    .verify_password(password.as_bytes(), &hash)
    .is_ok();

  if username == config.username && password_ok {
    Ok(())
  } else {
    Err(Error::Unauthorized)
  }
}

/// Decode `user:password` from a Basic authorization header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let decoded = B64.decode(value.strip_prefix("Basic ")?).ok()?;
  let creds = String::from_utf8(decoded).ok()?;
  let (user, pass) = creds.split_once(':')?;
  Some((user.to_owned(), pass.to_owned()))
}

/// Middleware rejecting unauthenticated requests with 401.
pub async fn require_auth(
  State(config): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Result<Response, Error> {
  if let Err(e) = verify_auth(req.headers(), &config) {
    warn!(path = %req.uri().path(), "rejected admin request");
    return Err(e);
  }
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::HeaderValue;
  use rand_core::OsRng;

  use super::*;

  fn make_config(password: &str) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig { username: "admin".to_string(), password_hash: hash }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[test]
  fn correct_credentials() {
    let config = make_config("secret");
    assert!(verify_auth(&headers(&basic("admin", "secret")), &config).is_ok());
  }

  #[test]
  fn wrong_password() {
    let config = make_config("secret");
    assert!(matches!(
      verify_auth(&headers(&basic("admin", "wrong")), &config),
      Err(Error::Unauthorized)
    ));
  }

  #[test]
  fn wrong_username() {
    let config = make_config("secret");
    assert!(verify_auth(&headers(&basic("root", "secret")), &config).is_err());
  }

  #[test]
  fn missing_or_malformed_header() {
    let config = make_config("secret");
    assert!(verify_auth(&HeaderMap::new(), &config).is_err());
    assert!(verify_auth(&headers("Bearer abc"), &config).is_err());
    assert!(verify_auth(&headers("Basic !!!"), &config).is_err());
    assert!(verify_auth(&headers(&format!("Basic {}", B64.encode("no-colon"))), &config).is_err());
  }

  #[test]
  fn unparseable_hash_rejects_everyone() {
    let config = AuthConfig {
      username:      "admin".to_string(),
      password_hash: "not-a-phc-string".to_string(),
    };
    assert!(verify_auth(&headers(&basic("admin", "")), &config).is_err());
  }
}
