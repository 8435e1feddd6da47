//! Decoding of base64 image payloads.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::ApiError;

/// Decode a base64 image, accepting an optional `data:<mime>;base64,` prefix
/// as produced by browser canvases. An empty string decodes to no bytes.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, ApiError> {
  let payload = match encoded.split_once(";base64,") {
    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
    _ => encoded,
  };
  STANDARD
    .decode(payload.trim())
    .map_err(|e| ApiError::BadRequest(format!("image is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn data_url_prefix_is_stripped() {
    let plain = decode_image("aGVsbG8=").unwrap();
    let url = decode_image("data:image/jpeg;base64,aGVsbG8=").unwrap();
    assert_eq!(plain, b"hello");
    assert_eq!(url, plain);
  }

  #[test]
  fn garbage_is_a_bad_request() {
    assert!(matches!(decode_image("not base64!"), Err(ApiError::BadRequest(_))));
    assert!(decode_image("").unwrap().is_empty());
  }
}
