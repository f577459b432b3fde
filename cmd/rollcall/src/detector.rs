//! Face detector backed by an HTTP inference service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use rollcall_attendance::{BoundingBox, DetectError, DetectedFace, FaceDetector};
use serde::Deserialize;
use tracing::debug;

/// Posts images to a detection service as multipart `image` uploads.
///
/// The service answers with
/// `{"faces": [{"bbox": [x1, y1, x2, y2], "embedding": [...]}]}`.
pub struct HttpFaceDetector {
    client: Client,
    url: String,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<FaceRow>,
}

#[derive(Deserialize)]
struct FaceRow {
    bbox: [f32; 4],
    embedding: Vec<f32>,
}

impl HttpFaceDetector {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl FaceDetector for HttpFaceDetector {
    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, DetectError> {
        let part = Part::bytes(image.to_vec()).file_name("frame.jpg");
        let form = Form::new().part("image", part);

        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DetectError::Model(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let msg = format!("{}: {}", status, body);
            return Err(if status.is_client_error() {
                DetectError::InvalidImage(msg)
            } else {
                DetectError::Model(msg)
            });
        }

        let parsed: DetectResponse = resp
            .json()
            .await
            .map_err(|e| DetectError::Model(format!("decode response: {}", e)))?;
        debug!(faces = parsed.faces.len(), "detector responded");

        Ok(parsed
            .faces
            .into_iter()
            .map(|f| DetectedFace::new(BoundingBox::from_f32(f.bbox), f.embedding))
            .collect())
    }
}
