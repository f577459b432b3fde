use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// Face bounding box `[x1, y1, x2, y2]` in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox(pub [i32; 4]);

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self([x1, y1, x2, y2])
    }

    /// Truncates float model coordinates toward zero.
    pub fn from_f32(b: [f32; 4]) -> Self {
        Self(b.map(|v| v as i32))
    }
}

/// One face found in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Vec<f32>,
}

impl DetectedFace {
    pub fn new(bbox: BoundingBox, embedding: Vec<f32>) -> Self {
        Self { bbox, embedding }
    }
}

/// Finds faces in an encoded image and computes their embeddings.
///
/// The image is passed as received (e.g. JPEG or PNG bytes); decoding is the
/// detector's job. An image with no faces is `Ok(vec![])`, not an error.
///
/// # Thread Safety
///
/// One detector is shared by every session of a process, so implementations
/// must be safe for concurrent use.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Returns the faces in detection order.
    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, DetectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_truncates() {
        let b = BoundingBox::from_f32([10.9, 20.2, 30.5, -0.7]);
        assert_eq!(b, BoundingBox::new(10, 20, 30, 0));
    }

    #[test]
    fn bbox_serializes_as_array() {
        let json = serde_json::to_string(&BoundingBox::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "[1,2,3,4]");
    }
}
