use std::collections::HashMap;

use rollcall_vecmatch::{FlatIndex, Match, VecMatchError};
use tracing::{info, warn};

use crate::error::RosterError;
use crate::record::{GroupId, SkipReason, Student, StudentId, StudentRecord, parse_embedding};
use crate::source::RosterSource;

/// Immutable per-session set of known students and their embeddings.
///
/// Row `i` of the embedding matrix belongs to `students()[i]`. The index is
/// built once and never mutated.
#[derive(Debug, Clone)]
pub struct RosterIndex {
    students: Vec<Student>,
    matrix: FlatIndex,
}

impl RosterIndex {
    /// Fetches the groups' students from `source` and builds the index.
    pub async fn load(
        source: &dyn RosterSource,
        group_ids: &[GroupId],
    ) -> Result<Self, RosterError> {
        let records = source.fetch(group_ids).await?;
        info!(
            group_count = group_ids.len(),
            records = records.len(),
            "roster fetched"
        );
        Self::build(records)
    }

    /// Builds the index from raw records.
    ///
    /// Records sharing an id are merged: the first occurrence fixes the
    /// position, the last one supplies the fields. Records without a usable
    /// embedding are skipped with a warning, as are records whose embedding
    /// length differs from the most common one.
    pub fn build(records: Vec<StudentRecord>) -> Result<Self, RosterError> {
        if records.is_empty() {
            return Err(RosterError::EmptyRoster);
        }

        let mut positions: HashMap<StudentId, usize> = HashMap::with_capacity(records.len());
        let mut unique: Vec<StudentRecord> = Vec::with_capacity(records.len());
        for record in records {
            match positions.get(&record.id) {
                Some(&i) => unique[i] = record,
                None => {
                    positions.insert(record.id.clone(), unique.len());
                    unique.push(record);
                }
            }
        }

        let parsed: Vec<Result<Vec<f32>, SkipReason>> = unique
            .iter()
            .map(|record| parse_embedding(record.face_embedding.as_ref()))
            .collect();
        let dim = majority_dimension(&parsed);

        let mut students = Vec::with_capacity(unique.len());
        let mut matrix = FlatIndex::with_dimension(dim);
        let (mut absent, mut malformed, mut mismatched) = (0usize, 0usize, 0usize);

        for (record, embedding) in unique.iter().zip(parsed) {
            let pushed = embedding.and_then(|emb| {
                matrix.push(&emb).map_err(|e| match e {
                    VecMatchError::DimensionMismatch { got, want } => {
                        SkipReason::DimensionMismatch { got, want }
                    }
                    VecMatchError::NonFinite { position } => {
                        SkipReason::Malformed(format!("element {position} is not finite"))
                    }
                    VecMatchError::EmptyVector => SkipReason::Absent,
                })
            });
            match pushed {
                Ok(_) => students.push(record.student()),
                Err(reason) => {
                    match &reason {
                        SkipReason::Absent => absent += 1,
                        SkipReason::DimensionMismatch { .. } => {
                            malformed += 1;
                            mismatched += 1;
                        }
                        SkipReason::Malformed(_) => malformed += 1,
                    }
                    warn!(
                        student_id = %record.id,
                        name = %record.name,
                        reason = %reason,
                        "skipping student"
                    );
                }
            }
        }

        if mismatched > 0 {
            warn!(
                dim,
                mismatched,
                kept = students.len(),
                "roster embeddings disagree on dimension; kept the most common one"
            );
        }

        if matrix.is_empty() {
            return Err(RosterError::NoUsableEmbeddings { absent, malformed });
        }

        info!(
            students = students.len(),
            skipped = absent + malformed,
            dim = matrix.dim(),
            "roster index built"
        );
        Ok(Self { students, matrix })
    }

    /// Returns the number of loaded students. Never zero.
    pub fn len(&self) -> usize {
        self.students.len()
    }

    /// Always false for a successfully built index.
    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Returns the embedding dimension.
    pub fn dim(&self) -> usize {
        self.matrix.dim()
    }

    /// Returns the loaded students in matrix row order.
    pub fn students(&self) -> &[Student] {
        &self.students
    }

    /// Returns the student at matrix row `i`.
    pub fn student(&self, i: usize) -> Option<&Student> {
        self.students.get(i)
    }

    /// Returns the embedding at matrix row `i`.
    pub fn embedding(&self, i: usize) -> Option<&[f32]> {
        self.matrix.row(i)
    }

    /// Finds the most similar student. No threshold is applied.
    pub fn search(&self, query: &[f32]) -> Option<Match> {
        self.matrix.search(query)
    }
}

/// Returns the most common length among usable embeddings, preferring the
/// earliest on ties, or 0 when there are none.
fn majority_dimension(parsed: &[Result<Vec<f32>, SkipReason>]) -> usize {
    let mut counts: HashMap<usize, (usize, usize)> = HashMap::new();
    for (i, emb) in parsed.iter().enumerate() {
        if let Ok(emb) = emb {
            counts.entry(emb.len()).or_insert((0, i)).0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map_or(0, |(dim, _)| dim)
}
