use rollcall_roster::{GroupId, RosterIndex, RosterSource, Student};
use serde::Serialize;
use tracing::info;

use crate::error::BatchError;
use crate::event::BoxDescriptor;
use crate::face::{DetectedFace, FaceDetector};
use crate::matcher::{MatchConfig, classify, confidence_percent};

/// A student found in the image, with their best score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentStudent {
    #[serde(flatten)]
    pub student: Student,
    /// `round(score * 100)` of the best detection.
    pub confidence: i32,
    #[serde(skip)]
    pub score: f32,
}

/// Present/absent partition of a roster for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Sorted by name.
    #[serde(rename = "present_students")]
    pub present: Vec<PresentStudent>,
    /// Sorted by name.
    #[serde(rename = "absent_students")]
    pub absent: Vec<Student>,
    /// Number of detections that matched no student.
    #[serde(rename = "unknown_faces")]
    pub unknown_count: usize,
    /// Embeddings of those detections, in detection order.
    #[serde(rename = "unknown_face_embeddings")]
    pub unknown_embeddings: Vec<Vec<f32>>,
    /// Per-detection boxes, as a streaming session would draw them.
    pub boxes: Vec<BoxDescriptor>,
}

/// Single-shot attendance over one image.
///
/// Uses the same roster search and threshold as a streaming session but
/// keeps no state between calls: every unmatched detection is counted on
/// its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchResolver {
    config: MatchConfig,
}

impl BatchResolver {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Partitions `roster` using the faces of one image.
    pub fn resolve(&self, roster: &RosterIndex, faces: &[DetectedFace]) -> BatchReport {
        let mut best: Vec<Option<f32>> = vec![None; roster.len()];
        let mut report = BatchReport::default();

        for face in faces {
            let result = classify(roster, &face.embedding, self.config.known_threshold);
            let known = result
                .row
                .filter(|_| result.is_known())
                .and_then(|row| roster.student(row).map(|student| (row, student)));
            match known {
                Some((row, student)) => {
                    report
                        .boxes
                        .push(BoxDescriptor::known(&student.name, result.score, face.bbox));
                    let slot = &mut best[row];
                    if slot.is_none_or(|s| result.score > s) {
                        *slot = Some(result.score);
                    }
                }
                None => {
                    report.boxes.push(BoxDescriptor::unknown(face.bbox));
                    report.unknown_count += 1;
                    report.unknown_embeddings.push(face.embedding.clone());
                }
            }
        }

        for (student, score) in roster.students().iter().zip(best) {
            match score {
                Some(score) => report.present.push(PresentStudent {
                    student: student.clone(),
                    confidence: confidence_percent(score),
                    score,
                }),
                None => report.absent.push(student.clone()),
            }
        }
        report
            .present
            .sort_by(|a, b| by_name(&a.student, &b.student));
        report.absent.sort_by(by_name);
        report
    }

    /// Loads the groups' roster, detects faces in `image` and resolves them.
    pub async fn resolve_image(
        &self,
        source: &dyn RosterSource,
        detector: &dyn FaceDetector,
        group_ids: &[GroupId],
        image: &[u8],
    ) -> Result<BatchReport, BatchError> {
        if group_ids.is_empty() {
            return Err(BatchError::NoGroups);
        }
        let roster = RosterIndex::load(source, group_ids).await?;
        let faces = detector.detect(image).await?;
        let report = self.resolve(&roster, &faces);
        info!(
            faces = faces.len(),
            present = report.present.len(),
            absent = report.absent.len(),
            unknown = report.unknown_count,
            "batch resolved"
        );
        Ok(report)
    }
}

fn by_name(a: &Student, b: &Student) -> std::cmp::Ordering {
    a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
}
