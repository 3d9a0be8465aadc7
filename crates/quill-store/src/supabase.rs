//! Supabase persistence adapter
//!
//! Writes through the PostgREST API with the service-role key. A note is
//! inserted first, then its action items in one batch. If the items insert
//! fails the note is deleted again so the import can be retried cleanly.

use crate::{format_timestamp, StoreError, ITEM_STATUS, NOTE_STATUS};
use chrono::{Local, NaiveDateTime};
use quill_domain::traits::PersistenceAdapter;
use quill_domain::{ExtractedRecord, PersistedReference, RecordId};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Supabase implementation of `PersistenceAdapter`
///
/// Uses the blocking `reqwest` client; call it from the blocking pool.
pub struct SupabaseStore {
    base_url: String,
    service_key: String,
    client: Client,
}

#[derive(Deserialize)]
struct InsertedRow {
    id: Value,
}

impl SupabaseStore {
    /// Create a store for the project at `url`
    pub fn new(
        url: impl Into<String>,
        service_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn post(&self, table: &str, body: &Value) -> Result<Response, StoreError> {
        let response = self
            .client
            .post(self.table_url(table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .map_err(|e| StoreError::Connection(format!("POST {} failed: {}", table, e)))?;
        check_status(table, response)
    }

    fn delete_note(&self, id: &RecordId) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.table_url("meeting_notes"))
            .query(&[("id", format!("eq.{}", id))])
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .map_err(|e| StoreError::Connection(format!("DELETE meeting_notes failed: {}", e)))?;
        check_status("meeting_notes", response).map(|_| ())
    }
}

fn check_status(table: &str, response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().unwrap_or_else(|_| "Unknown error".to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(StoreError::Unauthorized(format!("{}: HTTP {}", table, status)))
        }
        s if s.is_server_error() => Err(StoreError::Connection(format!(
            "{}: HTTP {}: {}",
            table, status, text
        ))),
        _ => Err(StoreError::Rejected(format!("{}: HTTP {}: {}", table, status, text))),
    }
}

fn note_body(
    record: &ExtractedRecord,
    org_id: &str,
    meeting_date: NaiveDateTime,
    published_at: NaiveDateTime,
) -> Value {
    let tags = if record.tags.is_empty() {
        Value::Null
    } else {
        json!(record.tags)
    };

    json!({
        "title": record.title,
        "content": record.body,
        "meeting_date": format_timestamp(meeting_date),
        "org_id": org_id,
        "tags": tags,
        "status": NOTE_STATUS,
        "published_at": format_timestamp(published_at),
    })
}

fn items_body(record: &ExtractedRecord, note_id: &RecordId) -> Value {
    Value::Array(
        record
            .items
            .iter()
            .map(|item| {
                json!({
                    "note_id": note_id.as_str(),
                    "title": item.title,
                    "description": item.description,
                    "status": ITEM_STATUS,
                })
            })
            .collect(),
    )
}

fn inserted_id(response: Response) -> Result<RecordId, StoreError> {
    let rows: Vec<InsertedRow> = response
        .json()
        .map_err(|e| StoreError::InvalidData(format!("Unreadable insert response: {}", e)))?;

    let id = rows
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::InvalidData("Insert returned no rows".to_string()))?
        .id;

    match id {
        Value::String(s) => Ok(RecordId::new(s)),
        Value::Number(n) => Ok(RecordId::new(n.to_string())),
        other => Err(StoreError::InvalidData(format!("Unexpected id value: {}", other))),
    }
}

impl PersistenceAdapter for SupabaseStore {
    type Error = StoreError;

    fn persist(
        &self,
        record: &ExtractedRecord,
        org_id: &str,
        meeting_date: Option<NaiveDateTime>,
    ) -> Result<PersistedReference, Self::Error> {
        let now = Local::now().naive_local();
        let body = note_body(record, org_id, meeting_date.unwrap_or(now), now);

        let note_id = inserted_id(self.post("meeting_notes", &body)?)?;
        debug!("Created meeting note {}", note_id);

        if !record.items.is_empty() {
            if let Err(e) = self.post("action_items", &items_body(record, &note_id)) {
                warn!("Action items insert failed for note {}, removing note", note_id);
                if let Err(cleanup) = self.delete_note(&note_id) {
                    warn!("Could not remove partial note {}: {}", note_id, cleanup);
                }
                return Err(e);
            }
        }

        Ok(PersistedReference::new(note_id, record.item_count()))
    }
}
