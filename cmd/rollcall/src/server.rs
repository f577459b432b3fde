//! HTTP server.
//!
//! API endpoints:
//! - GET  /health               - liveness check
//! - GET  /ws/start_attendance  - streaming attendance session (WebSocket)
//! - POST /process_class_image  - multipart `image` + `group_ids`, BatchReport JSON
//! - POST /get_embedding        - multipart `image`, first face's embedding

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use rollcall_attendance::{
    BatchError, BatchReport, BatchResolver, DetectError, FaceDetector, SessionConfig, SessionError,
};
use rollcall_roster::{GroupId, RosterSource};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::ws;

/// Shared, read-only collaborators of every request and session.
#[derive(Clone)]
pub struct AppState {
    pub roster: Arc<dyn RosterSource>,
    pub detector: Arc<dyn FaceDetector>,
    pub session: SessionConfig,
    pub resolver: BatchResolver,
}

impl AppState {
    pub fn new(
        roster: Arc<dyn RosterSource>,
        detector: Arc<dyn FaceDetector>,
        session: SessionConfig,
    ) -> Self {
        let resolver = BatchResolver::new(session.matching);
        Self {
            roster,
            detector,
            session,
            resolver,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/start_attendance", get(ws::start_attendance))
        .route("/process_class_image", post(process_class_image))
        .route("/get_embedding", post(get_embedding))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// JSON error body: `{"error": message}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::NoGroups => ApiError::bad_request("group_ids must be a non-empty array."),
            BatchError::Roster(e) => {
                let session_err = SessionError::from(e);
                let status = match &session_err {
                    SessionError::RosterUnavailable(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::NOT_FOUND,
                };
                let message = session_err
                    .client_message()
                    .unwrap_or("Failed to load roster.")
                    .to_string();
                Self { status, message }
            }
            BatchError::Detect(e) => e.into(),
        }
    }
}

impl From<DetectError> for ApiError {
    fn from(err: DetectError) -> Self {
        match err {
            DetectError::InvalidImage(_) => ApiError::bad_request("Could not decode image."),
            DetectError::Model(e) => {
                error!(error = %e, "face detector failed");
                Self {
                    status: StatusCode::BAD_GATEWAY,
                    message: "Face detector unavailable.".to_string(),
                }
            }
        }
    }
}

/// Fields of a multipart upload this server understands.
#[derive(Default)]
struct Upload {
    image: Option<Vec<u8>>,
    group_ids: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?;
                upload.image = Some(bytes.to_vec());
            }
            Some("group_ids") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?;
                upload.group_ids = Some(text);
            }
            _ => {}
        }
    }
    Ok(upload)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": "Attendance service is running." }))
}

async fn process_class_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BatchReport>, ApiError> {
    let upload = read_upload(multipart).await?;
    let (Some(image), Some(group_ids)) = (upload.image, upload.group_ids) else {
        return Err(ApiError::bad_request("Missing image or group_ids"));
    };
    let group_ids: Vec<GroupId> = serde_json::from_str(&group_ids)
        .map_err(|_| ApiError::bad_request("group_ids must be a non-empty array."))?;

    let report = state
        .resolver
        .resolve_image(
            state.roster.as_ref(),
            state.detector.as_ref(),
            &group_ids,
            &image,
        )
        .await
        .inspect_err(|e| warn!(error = %e, "class image rejected"))?;
    Ok(Json(report))
}

async fn get_embedding(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let upload = read_upload(multipart).await?;
    let Some(image) = upload.image else {
        return Err(ApiError::bad_request("No image file provided"));
    };
    let faces = state.detector.detect(&image).await?;
    match faces.into_iter().next() {
        Some(face) => Ok(Json(json!({ "embedding": face.embedding }))),
        None => Err(ApiError::bad_request("No face detected")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use reqwest::multipart::{Form, Part};
    use rollcall_attendance::{BoundingBox, DetectedFace};
    use rollcall_roster::{MemoryRosterSource, StudentRecord};
    use serde_json::Value;

    use super::*;

    struct ScriptedDetector(HashMap<&'static [u8], Vec<DetectedFace>>);

    #[async_trait]
    impl FaceDetector for ScriptedDetector {
        async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, DetectError> {
            match image {
                b"down" => Err(DetectError::Model("connection refused".into())),
                _ => self
                    .0
                    .get(image)
                    .cloned()
                    .ok_or_else(|| DetectError::InvalidImage("bad bytes".into())),
            }
        }
    }

    fn face(x: i32, embedding: &[f32]) -> DetectedFace {
        DetectedFace::new(BoundingBox::new(x, 0, x + 10, 10), embedding.to_vec())
    }

    async fn spawn_app() -> String {
        let roster = MemoryRosterSource::new()
            .with_group(
                "g1",
                [
                    StudentRecord::new("s1", "Zara").with_embedding(&[1.0, 0.0, 0.0]),
                    StudentRecord::new("s2", "Arun")
                        .with_roll_number("12")
                        .with_embedding(&[0.0, 1.0, 0.0]),
                ],
            )
            .with_group("g-none", [StudentRecord::new("s3", "Mei")]);
        let mut frames = HashMap::new();
        frames.insert(
            b"class".as_slice(),
            vec![face(0, &[1.0, 0.0, 0.0]), face(20, &[0.0, 0.0, 1.0])],
        );
        frames.insert(b"nobody".as_slice(), vec![]);
        let state = AppState::new(
            Arc::new(roster),
            Arc::new(ScriptedDetector(frames)),
            SessionConfig::default(),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn post_form(
        url: &str,
        image: Option<&'static [u8]>,
        groups: Option<&str>,
    ) -> (u16, Value) {
        let mut form = Form::new();
        if let Some(image) = image {
            form = form.part("image", Part::bytes(image).file_name("class.jpg"));
        }
        if let Some(groups) = groups {
            form = form.text("group_ids", groups.to_string());
        }
        let resp = reqwest::Client::new()
            .post(url)
            .multipart(form)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn health_ok() {
        let base = spawn_app().await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn class_image_report() {
        let base = spawn_app().await;
        let url = format!("{}/process_class_image", base);
        let (status, body) = post_form(&url, Some(b"class"), Some(r#"["g1"]"#)).await;
        assert_eq!(status, 200, "{body}");

        let present = body["present_students"].as_array().unwrap();
        assert_eq!(present.len(), 1);
        assert_eq!(present[0]["id"], "s1");
        assert_eq!(present[0]["confidence"], 100);
        assert_eq!(body["absent_students"][0]["name"], "Arun");
        assert_eq!(body["absent_students"][0]["roll_number"], "12");
        assert_eq!(body["unknown_faces"], 1);
        assert_eq!(body["unknown_face_embeddings"][0], serde_json::json!([0.0, 0.0, 1.0]));
        assert_eq!(body["boxes"][0]["label"], "Zara (100%)");
        assert_eq!(body["boxes"][1]["color"], "red");
    }

    #[tokio::test]
    async fn class_image_input_errors() {
        let base = spawn_app().await;
        let url = format!("{}/process_class_image", base);

        let (status, body) = post_form(&url, None, Some(r#"["g1"]"#)).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Missing image or group_ids");

        let (status, _) = post_form(&url, Some(b"class"), Some("[]")).await;
        assert_eq!(status, 400);
        let (status, _) = post_form(&url, Some(b"class"), Some("g1")).await;
        assert_eq!(status, 400);
        let (status, _) = post_form(&url, Some(b"???"), Some(r#"["g1"]"#)).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn class_image_roster_errors() {
        let base = spawn_app().await;
        let url = format!("{}/process_class_image", base);

        let (status, body) = post_form(&url, Some(b"class"), Some(r#"["missing"]"#)).await;
        assert_eq!(status, 404);
        assert_eq!(body["error"], "No students found for these groups.");

        let (status, body) = post_form(&url, Some(b"class"), Some(r#"["g-none"]"#)).await;
        assert_eq!(status, 404);
        assert_eq!(body["error"], "No students in these groups have registered faces.");

        let (status, _) = post_form(&url, Some(b"down"), Some(r#"["g1"]"#)).await;
        assert_eq!(status, 502);
    }

    #[tokio::test]
    async fn embedding_endpoint() {
        let base = spawn_app().await;
        let url = format!("{}/get_embedding", base);

        let (status, body) = post_form(&url, Some(b"class"), None).await;
        assert_eq!(status, 200);
        assert_eq!(body["embedding"], serde_json::json!([1.0, 0.0, 0.0]));

        let (status, body) = post_form(&url, Some(b"nobody"), None).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "No face detected");

        let (status, body) = post_form(&url, None, Some(r#"["g1"]"#)).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "No image file provided");
    }
}
