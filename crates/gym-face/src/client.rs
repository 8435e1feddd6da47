//! Async HTTP client for the face person-group REST API.

use std::time::Duration;

use gym_core::{
  directory::{Candidate, DetectedFace, GalleryStatus, IdentityDirectory, TrainingStatus},
  member::IdentityRef,
};
use reqwest::{Client, Method, RequestBuilder, Response, header::CONTENT_TYPE};
use tracing::debug;

use crate::{
  DirectoryConfig, Error, Result,
  wire::{
    CreateGroupBody, CreatePersonBody, CreatedPerson, ErrorBody, IdentifyBody,
    IdentifyResult, PersistedFace, WireFace, WireTrainingStatus,
  },
};

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const GROUP_EXISTS: &str = "PersonGroupExists";

/// Client for one person group on a face service resource.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based and pools
/// connections.
#[derive(Clone)]
pub struct FaceClient {
  client: Client,
  config: DirectoryConfig,
}

impl FaceClient {
  pub fn new(config: DirectoryConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/face/v1.0{}",
      self.config.endpoint.trim_end_matches('/'),
      path
    )
  }

  fn group_url(&self, path: &str) -> String {
    self.url(&format!("/persongroups/{}{path}", self.config.gallery_id))
  }

  fn request(&self, method: Method, url: String) -> RequestBuilder {
    self.client.request(method, url).header(KEY_HEADER, &self.config.key)
  }

  /// Send `req`, turning any non-success status into [`Error::Api`].
  async fn send(&self, req: RequestBuilder) -> Result<Response> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
      Ok(body) => (body.error.code, body.error.message),
      Err(_) => (String::new(), text),
    };
    Err(Error::Api { status: status.as_u16(), code, message })
  }
}

// ─── IdentityDirectory impl ──────────────────────────────────────────────────

impl IdentityDirectory for FaceClient {
  type Error = Error;

  /// `PUT /persongroups/{id}`; a `PersonGroupExists` conflict counts as done.
  async fn ensure_gallery(&self) -> Result<GalleryStatus> {
    let body = CreateGroupBody {
      name:              &self.config.gallery_name,
      recognition_model: &self.config.recognition_model,
      user_data:         "Enrolled gym members",
    };
    let req = self.request(Method::PUT, self.group_url("")).json(&body);

    match self.send(req).await {
      Ok(_) => Ok(GalleryStatus::Created),
      Err(e) if e.api_code() == Some(GROUP_EXISTS) => Ok(GalleryStatus::AlreadyExisted),
      Err(e) => Err(e),
    }
  }

  /// `POST /detect` with the raw image bytes.
  async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>> {
    let req = self
      .request(Method::POST, self.url("/detect"))
      .query(&[
        ("returnFaceId", "true"),
        ("returnFaceLandmarks", "false"),
        ("recognitionModel", self.config.recognition_model.as_str()),
        ("detectionModel", self.config.detection_model.as_str()),
      ])
      .header(CONTENT_TYPE, "application/octet-stream")
      .body(image.to_vec());

    let faces: Vec<WireFace> = self.send(req).await?.json().await?;
    debug!(faces = faces.len(), bytes = image.len(), "detect");
    Ok(
      faces
        .into_iter()
        .map(|f| DetectedFace { face_id: f.face_id, rectangle: f.face_rectangle })
        .collect(),
    )
  }

  /// `POST /identify` for a single face, asking for the best candidate.
  async fn identify(
    &self,
    face: &DetectedFace,
    threshold: f32,
  ) -> Result<Option<Candidate>> {
    let body = IdentifyBody {
      face_ids:                       [face.face_id.as_str()],
      person_group_id:                &self.config.gallery_id,
      max_num_of_candidates_returned: 1,
      confidence_threshold:           threshold,
    };
    let req = self.request(Method::POST, self.url("/identify")).json(&body);

    let results: Vec<IdentifyResult> = self.send(req).await?.json().await?;
    let candidate = results
      .into_iter()
      .next()
      .and_then(|r| r.candidates.into_iter().next())
      .map(|c| Candidate { identity: IdentityRef(c.person_id), confidence: c.confidence });
    debug!(face_id = %face.face_id, matched = candidate.is_some(), "identify");
    Ok(candidate)
  }

  async fn create_identity(&self, name: &str) -> Result<IdentityRef> {
    let user_data = format!("Member: {name}");
    let body = CreatePersonBody { name, user_data: &user_data };
    let req = self
      .request(Method::POST, self.group_url("/persons"))
      .json(&body);

    let person: CreatedPerson = self.send(req).await?.json().await?;
    debug!(person_id = %person.person_id, "person created");
    Ok(IdentityRef(person.person_id))
  }

  async fn add_face(&self, identity: &IdentityRef, image: &[u8]) -> Result<String> {
    let req = self
      .request(
        Method::POST,
        self.group_url(&format!("/persons/{identity}/persistedFaces")),
      )
      .query(&[("detectionModel", self.config.detection_model.as_str())])
      .header(CONTENT_TYPE, "application/octet-stream")
      .body(image.to_vec());

    let face: PersistedFace = self.send(req).await?.json().await?;
    debug!(%identity, persisted_face_id = %face.persisted_face_id, "face attached");
    Ok(face.persisted_face_id)
  }

  async fn delete_identity(&self, identity: &IdentityRef) -> Result<()> {
    let req = self.request(
      Method::DELETE,
      self.group_url(&format!("/persons/{identity}")),
    );
    self.send(req).await?;
    debug!(%identity, "person deleted");
    Ok(())
  }

  /// `POST /persongroups/{id}/train`; the service answers 202 immediately.
  async fn start_training(&self) -> Result<()> {
    let req = self.request(Method::POST, self.group_url("/train"));
    self.send(req).await?;
    debug!(gallery = %self.config.gallery_id, "training started");
    Ok(())
  }

  async fn training_status(&self) -> Result<TrainingStatus> {
    let req = self.request(Method::GET, self.group_url("/training"));
    let wire: WireTrainingStatus = self.send(req).await?.json().await?;

    match wire.status.to_ascii_lowercase().as_str() {
      "notstarted" => Ok(TrainingStatus::NotStarted),
      "running" => Ok(TrainingStatus::Running),
      "succeeded" => Ok(TrainingStatus::Succeeded),
      "failed" => Ok(TrainingStatus::Failed(wire.message)),
      other => Err(Error::UnexpectedResponse(format!("training status {other:?}"))),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
  };

  use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response as AxumResponse},
    routing::{delete, get, post, put},
  };
  use serde_json::{Value, json};

  use super::*;

  const KEY: &str = "test-key";

  #[derive(Default)]
  struct Mock {
    groups:        Mutex<HashSet<String>>,
    detect_params: Mutex<Vec<(String, String)>>,
    identify_body: Mutex<Option<Value>>,
    deleted:       Mutex<Vec<String>>,
    training:      Mutex<Option<Value>>,
  }

  type Shared = State<Arc<Mock>>;

  fn api_error(status: StatusCode, code: &str, message: &str) -> AxumResponse {
    (status, Json(json!({ "error": { "code": code, "message": message } })))
      .into_response()
  }

  async fn require_key(req: Request, next: Next) -> AxumResponse {
    let authorised = req.headers().get(KEY_HEADER).is_some_and(|v| v == KEY);
    if authorised {
      next.run(req).await
    } else {
      api_error(StatusCode::UNAUTHORIZED, "401", "Access denied")
    }
  }

  async fn create_group(State(mock): Shared, Path(group): Path<String>) -> AxumResponse {
    if !mock.groups.lock().unwrap().insert(group) {
      return api_error(StatusCode::CONFLICT, GROUP_EXISTS, "group exists");
    }
    StatusCode::OK.into_response()
  }

  async fn detect(
    State(mock): Shared,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
  ) -> Json<Value> {
    *mock.detect_params.lock().unwrap() = params;
    let face = |id: &str| {
      json!({
        "faceId": id,
        "faceRectangle": { "top": 10, "left": 20, "width": 100, "height": 120 }
      })
    };
    Json(match &body[..] {
      b"empty" => json!([]),
      b"crowd" => json!([face("f-1"), face("f-2")]),
      _ => json!([face("f-1")]),
    })
  }

  async fn identify(State(mock): Shared, Json(body): Json<Value>) -> Json<Value> {
    let face_id = body["faceIds"][0].as_str().unwrap_or_default().to_owned();
    *mock.identify_body.lock().unwrap() = Some(body);
    Json(if face_id == "stranger" {
      json!([{ "faceId": face_id, "candidates": [] }])
    } else {
      json!([{
        "faceId": face_id,
        "candidates": [{ "personId": "p-1", "confidence": 0.91 }]
      }])
    })
  }

  async fn create_person(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["userData"], format!("Member: {}", body["name"].as_str().unwrap()));
    Json(json!({ "personId": "p-1" }))
  }

  async fn add_face(
    Path((_, person)): Path<(String, String)>,
    body: Bytes,
  ) -> AxumResponse {
    if body.is_empty() {
      return api_error(StatusCode::BAD_REQUEST, "InvalidImage", "empty image");
    }
    Json(json!({ "persistedFaceId": format!("pf-{person}") })).into_response()
  }

  async fn delete_person(
    State(mock): Shared,
    Path((_, person)): Path<(String, String)>,
  ) -> StatusCode {
    mock.deleted.lock().unwrap().push(person);
    StatusCode::OK
  }

  async fn train() -> StatusCode { StatusCode::ACCEPTED }

  async fn training(State(mock): Shared) -> Json<Value> {
    Json(
      mock
        .training
        .lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| json!({ "status": "notstarted" })),
    )
  }

  fn config(endpoint: String, key: &str) -> DirectoryConfig {
    DirectoryConfig {
      endpoint,
      key:               key.into(),
      gallery_id:        "gym".into(),
      gallery_name:      "Gym members".into(),
      recognition_model: "recognition_04".into(),
      detection_model:   "detection_03".into(),
      timeout_secs:      5,
    }
  }

  async fn spawn_mock(key: &str) -> (FaceClient, Arc<Mock>) {
    let mock = Arc::new(Mock::default());
    let app = Router::new()
      .route("/face/v1.0/persongroups/{group}", put(create_group))
      .route("/face/v1.0/detect", post(detect))
      .route("/face/v1.0/identify", post(identify))
      .route("/face/v1.0/persongroups/{group}/persons", post(create_person))
      .route(
        "/face/v1.0/persongroups/{group}/persons/{person}/persistedFaces",
        post(add_face),
      )
      .route(
        "/face/v1.0/persongroups/{group}/persons/{person}",
        delete(delete_person),
      )
      .route("/face/v1.0/persongroups/{group}/train", post(train))
      .route("/face/v1.0/persongroups/{group}/training", get(training))
      .layer(middleware::from_fn(require_key))
      .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    // Trailing slash is tolerated.
    let client = FaceClient::new(config(format!("http://{addr}/"), key)).unwrap();
    (client, mock)
  }

  #[tokio::test]
  async fn ensure_gallery_is_idempotent() {
    let (client, mock) = spawn_mock(KEY).await;
    assert_eq!(client.ensure_gallery().await.unwrap(), GalleryStatus::Created);
    assert_eq!(client.ensure_gallery().await.unwrap(), GalleryStatus::AlreadyExisted);
    assert!(mock.groups.lock().unwrap().contains("gym"));
  }

  #[tokio::test]
  async fn detect_reports_every_face_with_models() {
    let (client, mock) = spawn_mock(KEY).await;

    let faces = client.detect(b"portrait").await.unwrap();
    assert_eq!(faces.len(), 1);
    assert_eq!(faces[0].face_id, "f-1");
    assert_eq!(faces[0].rectangle.map(|r| r.width), Some(100));

    let params = mock.detect_params.lock().unwrap().clone();
    assert!(params.contains(&("detectionModel".into(), "detection_03".into())));
    assert!(params.contains(&("recognitionModel".into(), "recognition_04".into())));

    assert!(client.detect(b"empty").await.unwrap().is_empty());
    assert_eq!(client.detect(b"crowd").await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn identify_returns_best_candidate_or_none() {
    let (client, mock) = spawn_mock(KEY).await;
    let face = DetectedFace { face_id: "f-1".into(), rectangle: None };

    let candidate = client.identify(&face, 0.7).await.unwrap().unwrap();
    assert_eq!(candidate.identity, IdentityRef("p-1".into()));
    assert!((candidate.confidence - 0.91).abs() < 1e-6);

    let sent = mock.identify_body.lock().unwrap().clone().unwrap();
    assert_eq!(sent["personGroupId"], "gym");
    assert_eq!(sent["maxNumOfCandidatesReturned"], 1);
    assert!((sent["confidenceThreshold"].as_f64().unwrap() - 0.7).abs() < 1e-6);

    let stranger = DetectedFace { face_id: "stranger".into(), rectangle: None };
    assert!(client.identify(&stranger, 0.7).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn person_lifecycle() {
    let (client, mock) = spawn_mock(KEY).await;
    let identity = client.create_identity("Ana Pérez").await.unwrap();
    assert_eq!(identity.as_str(), "p-1");

    let face_id = client.add_face(&identity, b"portrait").await.unwrap();
    assert_eq!(face_id, "pf-p-1");

    let err = client.add_face(&identity, b"").await.unwrap_err();
    assert_eq!(err.api_code(), Some("InvalidImage"));

    client.delete_identity(&identity).await.unwrap();
    assert_eq!(*mock.deleted.lock().unwrap(), ["p-1"]);
  }

  #[tokio::test]
  async fn training_status_is_mapped() {
    let (client, mock) = spawn_mock(KEY).await;
    client.start_training().await.unwrap();
    assert_eq!(client.training_status().await.unwrap(), TrainingStatus::NotStarted);

    *mock.training.lock().unwrap() = Some(json!({ "status": "running" }));
    assert_eq!(client.training_status().await.unwrap(), TrainingStatus::Running);

    *mock.training.lock().unwrap() = Some(json!({ "status": "succeeded" }));
    assert_eq!(client.training_status().await.unwrap(), TrainingStatus::Succeeded);

    *mock.training.lock().unwrap() =
      Some(json!({ "status": "failed", "message": "no faces" }));
    assert_eq!(
      client.training_status().await.unwrap(),
      TrainingStatus::Failed(Some("no faces".into()))
    );

    *mock.training.lock().unwrap() = Some(json!({ "status": "paused" }));
    assert!(matches!(
      client.training_status().await,
      Err(Error::UnexpectedResponse(_))
    ));
  }

  #[tokio::test]
  async fn wrong_key_is_an_api_error() {
    let (client, _) = spawn_mock("wrong").await;
    match client.detect(b"portrait").await {
      Err(Error::Api { status, .. }) => assert_eq!(status, 401),
      other => panic!("expected API error, got {other:?}"),
    }
  }
}
