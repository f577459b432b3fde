use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::RosterError;
use crate::record::{GroupId, StudentRecord};

/// Supplies the students belonging to a set of groups.
///
/// Implementations return every membership row they find; a student listed
/// in several groups may appear several times. De-duplication happens in
/// [`RosterIndex::build`](crate::RosterIndex::build).
///
/// Implementations must be safe for concurrent use: one source is shared by
/// every session of a process.
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Returns the student records of the given groups.
    async fn fetch(&self, group_ids: &[GroupId]) -> Result<Vec<StudentRecord>, RosterError>;
}

/// In-memory [`RosterSource`] keyed by group id.
#[derive(Debug, Clone, Default)]
pub struct MemoryRosterSource {
    groups: HashMap<GroupId, Vec<StudentRecord>>,
}

impl MemoryRosterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source from a prepared group map.
    pub fn from_groups(groups: HashMap<GroupId, Vec<StudentRecord>>) -> Self {
        Self { groups }
    }

    /// Adds a group, appending to any records it already has.
    pub fn with_group(
        mut self,
        group_id: impl Into<GroupId>,
        records: impl IntoIterator<Item = StudentRecord>,
    ) -> Self {
        self.groups.entry(group_id.into()).or_default().extend(records);
        self
    }

    /// Returns the number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[async_trait]
impl RosterSource for MemoryRosterSource {
    async fn fetch(&self, group_ids: &[GroupId]) -> Result<Vec<StudentRecord>, RosterError> {
        Ok(group_ids
            .iter()
            .filter_map(|g| self.groups.get(g))
            .flatten()
            .cloned()
            .collect())
    }
}
