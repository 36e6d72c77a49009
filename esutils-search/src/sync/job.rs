//! Index jobs and their state.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Job unique identifier.
pub type JobId = Uuid;

/// Job name for re-deriving and upserting documents.
pub const INDEX_OBJECTS: &str = "index_objects";

/// Job name for removing documents.
pub const UNINDEX_OBJECTS: &str = "unindex_objects";

/// Job state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Job is waiting to be processed
    Pending,
    /// Job is currently being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed and will be retried
    Failed,
    /// Job failed permanently
    Dead,
}

/// A unit of work handed to a task runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub id: JobId,

    /// Job name
    pub job_type: String,

    /// Job payload
    pub data: Value,

    /// Current state
    pub state: JobState,

    /// Number of attempts
    pub attempts: u32,

    /// Maximum number of attempts
    pub max_attempts: u32,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// When the job was last started
    pub started_at: Option<DateTime<Utc>>,

    /// When the job completed or died
    pub completed_at: Option<DateTime<Utc>>,

    /// Error from the last failed attempt
    pub last_error: Option<String>,
}

impl Job {
    /// Create a new job.
    pub fn new(job_type: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            data,
            state: JobState::Pending,
            attempts: 0,
            max_attempts: 3,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_error: None,
        }
    }

    /// Set max attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Check if the job can be retried.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Mark job as processing.
    pub fn start_processing(&mut self) {
        self.state = JobState::Processing;
        self.started_at = Some(Utc::now());
        self.attempts += 1;
    }

    /// Mark job as completed.
    pub fn complete(&mut self) {
        self.state = JobState::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Record a failed attempt. The job dies once out of attempts.
    pub fn fail(&mut self, error: String) {
        self.last_error = Some(error);
        if self.can_retry() {
            self.state = JobState::Failed;
        } else {
            self.state = JobState::Dead;
            self.completed_at = Some(Utc::now());
        }
    }

    /// Record a failure that retrying cannot fix.
    pub fn bury(&mut self, error: String) {
        self.last_error = Some(error);
        self.state = JobState::Dead;
        self.completed_at = Some(Utc::now());
    }

    /// Exponential backoff: 2^(attempts - 1) seconds, capped at `max`.
    pub fn backoff_delay(&self, max: Duration) -> Duration {
        let seconds = 2_u64.saturating_pow(self.attempts.saturating_sub(1));
        Duration::from_secs(seconds).min(max)
    }
}

/// Payload of [`INDEX_OBJECTS`] and [`UNINDEX_OBJECTS`] jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexJob {
    /// Document type of the mapping to run against.
    pub document_type: String,
    /// Object identifiers.
    pub ids: Vec<String>,
    /// Id attribute the ids were read from. Only set for index jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_field: Option<String>,
}

impl IndexJob {
    pub fn index(
        document_type: impl Into<String>,
        ids: Vec<String>,
        id_field: impl Into<String>,
    ) -> Self {
        Self {
            document_type: document_type.into(),
            ids,
            id_field: Some(id_field.into()),
        }
    }

    pub fn unindex(document_type: impl Into<String>, ids: Vec<String>) -> Self {
        Self {
            document_type: document_type.into(),
            ids,
            id_field: None,
        }
    }

    /// Wrap the payload in a job named `job_type`.
    pub fn into_job(self, job_type: &str) -> Result<Job> {
        Ok(Job::new(job_type, serde_json::to_value(self)?))
    }

    /// Read the payload back out of a job.
    pub fn from_job(job: &Job) -> Result<Self> {
        Ok(serde_json::from_value(job.data.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_creation() {
        let job = IndexJob::index("article", vec!["1".into()], "id")
            .into_job(INDEX_OBJECTS)
            .unwrap();

        assert_eq!(job.job_type, INDEX_OBJECTS);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(
            job.data,
            json!({"document_type": "article", "ids": ["1"], "id_field": "id"})
        );
    }

    #[test]
    fn test_payload_round_trip_without_id_field() {
        let job = IndexJob::unindex("article", vec!["1".into(), "2".into()])
            .into_job(UNINDEX_OBJECTS)
            .unwrap();

        assert_eq!(job.data, json!({"document_type": "article", "ids": ["1", "2"]}));
        assert_eq!(
            IndexJob::from_job(&job).unwrap(),
            IndexJob::unindex("article", vec!["1".into(), "2".into()])
        );
    }

    #[test]
    fn test_job_retry_logic() {
        let mut job = Job::new("task", json!({})).with_max_attempts(2);

        job.start_processing();
        job.fail("Error 1".to_string());
        assert!(job.can_retry());
        assert_eq!(job.state, JobState::Failed);

        job.start_processing();
        job.fail("Error 2".to_string());
        assert!(!job.can_retry());
        assert_eq!(job.state, JobState::Dead);
        assert_eq!(job.last_error.as_deref(), Some("Error 2"));
    }

    #[test]
    fn test_bury_is_final() {
        let mut job = Job::new("task", json!({}));
        job.start_processing();
        job.bury("bad mapping".to_string());
        assert_eq!(job.state, JobState::Dead);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_backoff_delay() {
        let max = Duration::from_secs(3600);
        let mut job = Job::new("task", json!({}));

        job.attempts = 1;
        assert_eq!(job.backoff_delay(max), Duration::from_secs(1));

        job.attempts = 3;
        assert_eq!(job.backoff_delay(max), Duration::from_secs(4));

        job.attempts = 40;
        assert_eq!(job.backoff_delay(max), max);
    }
}
