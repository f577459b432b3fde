use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::RosterError;
use crate::record::{GroupId, StudentRecord};
use crate::source::RosterSource;

const MEMBERS_TABLE: &str = "student_group_members";
const STUDENT_SELECT: &str = "students(id,name,roll_number,face_embedding)";

/// [`RosterSource`] backed by a PostgREST endpoint (e.g. Supabase).
///
/// Queries `student_group_members` with the joined `students` row and
/// authenticates with both the `apikey` header and a bearer token.
pub struct RestRosterSource {
    client: Client,
    base_url: String,
    api_key: String,
}

/// One `student_group_members` row with its embedded student.
#[derive(Deserialize)]
struct MemberRow {
    #[serde(default)]
    students: Option<StudentRecord>,
}

impl RestRosterSource {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self::with_client(Client::new(), base_url, api_key)
    }

    pub fn with_client(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn members_url(&self) -> String {
        format!("{}/rest/v1/{MEMBERS_TABLE}", self.base_url)
    }
}

/// Builds a PostgREST `in.(...)` filter with every id double-quoted.
fn in_filter(group_ids: &[GroupId]) -> String {
    let quoted: Vec<String> = group_ids
        .iter()
        .map(|g| format!("\"{}\"", g.as_str().replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

/// Drops membership rows whose student join came back null.
fn flatten_rows(rows: Vec<MemberRow>) -> Vec<StudentRecord> {
    rows.into_iter().filter_map(|r| r.students).collect()
}

#[async_trait]
impl RosterSource for RestRosterSource {
    async fn fetch(&self, group_ids: &[GroupId]) -> Result<Vec<StudentRecord>, RosterError> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.members_url();
        debug!(url = %url, group_count = group_ids.len(), "fetching roster");

        let resp = self
            .client
            .get(&url)
            .query(&[("select", STUDENT_SELECT.to_string()), ("group_id", in_filter(group_ids))])
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| RosterError::Source(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RosterError::Source(format!("HTTP {status}: {body}")));
        }

        let rows: Vec<MemberRow> = resp
            .json()
            .await
            .map_err(|e| RosterError::Source(e.to_string()))?;
        Ok(flatten_rows(rows))
    }
}
