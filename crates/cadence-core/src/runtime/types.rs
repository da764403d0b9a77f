use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Unique identifier for a submitted generation job.
///
/// Rendered as `gen_` followed by 12 lowercase hex characters taken from a
/// v4 UUID, e.g. `gen_3f2a9c01b7de`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    const PREFIX: &'static str = "gen_";
    const HEX_LEN: usize = 12;

    /// Draw a fresh random id. Uniqueness against existing jobs is enforced
    /// by the [`JobStore`](crate::JobStore), not here.
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", Self::PREFIX, &hex[..Self::HEX_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Lifecycle state of a job.
///
/// ```text
/// queued ──▶ processing ──▶ completed
///   │            │
///   │            └────────▶ failed
///   └────────────┴────────▶ cancelled
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum JobStatus {
    /// Accepted, waiting for a dispatch permit.
    Queued,
    /// The inference call is in flight or the artifact is being written.
    Processing,
    /// The artifact is persisted and downloadable.
    Completed,
    /// Inference or persistence failed; the error is recorded on the job.
    Failed,
    /// Cancelled by a caller before reaching another terminal state.
    Cancelled,
}

impl JobStatus {
    /// Returns `true` once the job can no longer change state.
    ///
    /// Terminal jobs reject every further transition, including progress
    /// updates and cancellation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Metadata of a persisted artifact, attached only to completed jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub location: PathBuf,
    /// Size of the encoded file in bytes.
    pub file_size: u64,
    /// Measured audio length (`frames / sample_rate`), in seconds.
    pub actual_duration: f32,
    pub sample_rate: u32,
}

/// Handle returned by [`Orchestrator::submit_job`](crate::Orchestrator::submit_job).
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// `created_at` plus the progress reporter's time estimate.
    pub estimated_completion: Option<DateTime<Utc>>,
}

/// A read-only snapshot of one job returned to callers.
#[derive(Debug, Clone)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f32,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub prompt: String,
    pub duration: f32,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

/// Condensed listing entry; the prompt is truncated for display.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub job_id: JobId,
    pub status: JobStatus,
    pub prompt: String,
    pub duration: f32,
    pub created_at: DateTime<Utc>,
}

/// One page of [`JobSummary`] entries, newest first.
#[derive(Debug, Clone, Default)]
pub struct JobPage {
    pub jobs: Vec<JobSummary>,
    /// Number of jobs matching the filter before the limit was applied.
    pub total: usize,
}

/// Errors produced by the runtime layer.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// The request failed field validation; no job was created.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced job (or its artifact) does not exist.
    #[error("job not found: {job_id}")]
    NotFound { job_id: JobId },

    /// The job's current status does not allow the requested action.
    #[error("cannot {action} {status} job {job_id}")]
    InvalidState {
        job_id: JobId,
        status: JobStatus,
        action: &'static str,
    },

    /// The inference engine failed or returned an unusable buffer.
    #[error("inference failed: {0}")]
    InferenceFailure(String),

    /// The artifact could not be written or read back.
    #[error("persistence failed: {0}")]
    PersistenceFailure(String),

    /// Every freshly drawn id collided with an existing job.
    #[error("could not allocate a unique job id after {attempts} attempts")]
    IdExhausted { attempts: usize },

    /// The dispatch gate was closed while a job was waiting on it.
    #[error("orchestrator shut down")]
    Shutdown,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_ids_have_prefix_and_hex_suffix() {
        let id = JobId::generate();
        let suffix = id.as_str().strip_prefix("gen_").expect("gen_ prefix");
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(id, JobId::generate());
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(JobStatus::Processing.to_string(), "processing");
        assert_eq!("Cancelled".parse::<JobStatus>().ok(), Some(JobStatus::Cancelled));
        assert!("bogus".parse::<JobStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn invalid_state_message_names_action_and_status() {
        let err = RuntimeError::InvalidState {
            job_id: JobId::from("gen_000000000000"),
            status: JobStatus::Completed,
            action: "cancel",
        };
        assert_eq!(err.to_string(), "cannot cancel completed job gen_000000000000");
    }
}
