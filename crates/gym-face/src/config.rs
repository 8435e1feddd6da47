use serde::Deserialize;

/// Connection and model settings for the face service.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
  /// Base URL of the resource, e.g. `https://gym.cognitiveservices.azure.com`.
  pub endpoint:          String,
  /// Subscription key sent as `Ocp-Apim-Subscription-Key`.
  pub key:               String,
  /// Person group used as the gallery.
  pub gallery_id:        String,
  #[serde(default = "default_gallery_name")]
  pub gallery_name:      String,
  #[serde(default = "default_recognition_model")]
  pub recognition_model: String,
  #[serde(default = "default_detection_model")]
  pub detection_model:   String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:      u64,
}

fn default_gallery_name() -> String { "Gym members".into() }
fn default_recognition_model() -> String { "recognition_04".into() }
fn default_detection_model() -> String { "detection_03".into() }
fn default_timeout_secs() -> u64 { 30 }
