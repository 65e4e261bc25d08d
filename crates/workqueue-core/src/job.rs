//! Job record and its deterministic wire encoding.

use crate::error::{JobError, JobResult};
use crate::priority::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique job identifier: 128-bit random, rendered as hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Creates a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A unit of work: a single file awaiting processing.
///
/// `extra` carries any fields present on the wire but not named here
/// (`#[serde(flatten)]`) so an older/newer producer's unknown fields
/// survive a decode/re-encode round trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub filepath: String,
    pub filesize: u64,
    pub priority: Priority,
    pub retries: u32,
    pub creation_time: DateTime<Utc>,
    pub trace_id: String,
    pub span_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    pub fn new(filepath: impl Into<String>, filesize: u64, priority: Priority) -> Self {
        Self {
            id: JobId::new(),
            filepath: filepath.into(),
            filesize,
            priority,
            retries: 0,
            creation_time: Utc::now(),
            trace_id: String::new(),
            span_id: String::new(),
            extra: Map::new(),
        }
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self.span_id = span_id.into();
        self
    }

    /// Returns a copy with `retries` incremented by one. The spec requires
    /// this counter to be monotonically non-decreasing across the job's
    /// lifetime; only the worker's retry path is allowed to call this.
    pub fn with_incremented_retries(&self) -> Self {
        let mut next = self.clone();
        next.retries += 1;
        next
    }

    /// Canonical JSON encoding. `serde_json::Map` (without the
    /// `preserve_order` feature) is backed by a `BTreeMap`, so field order
    /// is always lexicographic - two calls on logically-identical jobs
    /// always produce byte-identical output, which is what lets the
    /// reaper and worker loop remove a job from a list by value (`LREM`)
    /// instead of needing a secondary id index.
    pub fn encode(&self) -> JobResult<Vec<u8>> {
        let value = serde_json::to_value(self).map_err(|e| JobError::Internal(e.to_string()))?;
        let canonical: Map<String, Value> = match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => unreachable!("Job always serializes to an object"),
        };
        serde_json::to_vec(&Value::Object(canonical)).map_err(|e| JobError::Internal(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> JobResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| JobError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        let job = Job::new("/data/in/a.csv", 1024, Priority::high());
        let bytes = job.encode().unwrap();
        let decoded = Job::decode(&bytes).unwrap();
        assert_eq!(job, decoded);
    }

    #[test]
    fn encode_is_deterministic() {
        let job = Job::new("/data/in/a.csv", 1024, Priority::low());
        assert_eq!(job.encode().unwrap(), job.encode().unwrap());
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let mut job = Job::new("/data/in/a.csv", 1024, Priority::low());
        job.extra.insert("source_host".to_string(), Value::String("ingest-3".into()));
        let bytes = job.encode().unwrap();
        let decoded = Job::decode(&bytes).unwrap();
        assert_eq!(decoded.extra.get("source_host").unwrap(), "ingest-3");
    }

    #[test]
    fn incrementing_retries_preserves_identity() {
        let job = Job::new("/data/in/a.csv", 1024, Priority::low());
        let retried = job.with_incremented_retries();
        assert_eq!(retried.id, job.id);
        assert_eq!(retried.retries, 1);
        assert_eq!(job.retries, 0);
    }

    #[test]
    fn decode_of_garbage_is_a_decode_error() {
        let err = Job::decode(b"not json").unwrap_err();
        assert!(matches!(err, JobError::Decode(_)));
    }
}
