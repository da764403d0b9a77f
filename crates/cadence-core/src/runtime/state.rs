use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::runtime::request::GenerationRequest;
use crate::runtime::types::{
    JobId, JobResult, JobStatus, JobStatusView, JobSummary, RuntimeError,
};

/// Progress recorded when a job is dispatched to the engine.
pub const DISPATCHED_PROGRESS: f32 = 0.1;
/// Upper bound for any progress value written before completion.
pub const MAX_PENDING_PROGRESS: f32 = 0.99;

const SUMMARY_PROMPT_CHARS: usize = 100;

pub(crate) const MSG_QUEUED: &str = "Job queued for processing";
pub(crate) const MSG_DISPATCHED: &str = "Generating audio...";
pub(crate) const MSG_COMPLETED: &str = "Generation completed successfully";
pub(crate) const MSG_FAILED: &str = "Generation failed";
pub(crate) const MSG_CANCELLED: &str = "Job cancelled by user";
pub(crate) const MSG_SHUTDOWN: &str = "Job cancelled by shutdown";

/// The canonical record of one generation job.
///
/// Fields are only changed through the transition methods below, each of
/// which enforces the lifecycle rules and returns
/// [`RuntimeError::InvalidState`] when the current status forbids the move.
#[derive(Debug, Clone)]
pub struct Job {
    pub(crate) id: JobId,
    pub(crate) status: JobStatus,
    pub(crate) progress: f32,
    pub(crate) message: String,
    pub(crate) request: Arc<GenerationRequest>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
    pub(crate) result: Option<JobResult>,
    pub(crate) error: Option<String>,
}

impl Job {
    /// A fresh `queued` record.
    pub fn queued(id: JobId, request: Arc<GenerationRequest>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0.0,
            message: MSG_QUEUED.to_owned(),
            request,
            created_at: now,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn reject(&self, action: &'static str) -> RuntimeError {
        RuntimeError::InvalidState {
            job_id: self.id.clone(),
            status: self.status,
            action,
        }
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    /// `queued → processing`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), RuntimeError> {
        if self.status != JobStatus::Queued {
            return Err(self.reject("start"));
        }
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        self.progress = DISPATCHED_PROGRESS;
        self.message = MSG_DISPATCHED.to_owned();
        Ok(())
    }

    /// Record intermediate progress while `processing`.
    ///
    /// Values below the current progress leave it unchanged, values at or
    /// above 1.0 are capped at [`MAX_PENDING_PROGRESS`]. Only
    /// [`complete`](Self::complete) ever sets 1.0.
    pub fn advance(&mut self, progress: f32, message: impl Into<String>) -> Result<(), RuntimeError> {
        if self.status != JobStatus::Processing {
            return Err(self.reject("update progress of"));
        }
        let capped = progress.clamp(0.0, MAX_PENDING_PROGRESS);
        if capped > self.progress {
            self.progress = capped;
        }
        self.message = message.into();
        Ok(())
    }

    /// `processing → completed`.
    pub fn complete(&mut self, result: JobResult, now: DateTime<Utc>) -> Result<(), RuntimeError> {
        if self.status != JobStatus::Processing {
            return Err(self.reject("complete"));
        }
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.message = MSG_COMPLETED.to_owned();
        self.completed_at = Some(now);
        self.result = Some(result);
        Ok(())
    }

    /// `processing → failed`. Progress stays where it was.
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), RuntimeError> {
        if self.status != JobStatus::Processing {
            return Err(self.reject("fail"));
        }
        self.status = JobStatus::Failed;
        self.message = MSG_FAILED.to_owned();
        self.completed_at = Some(now);
        self.error = Some(error.into());
        Ok(())
    }

    /// `queued | processing → cancelled`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), RuntimeError> {
        self.cancel_with(MSG_CANCELLED, now)
    }

    /// Cancellation not requested by a caller, e.g. dispatch stopping.
    pub(crate) fn cancel_with(
        &mut self,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RuntimeError> {
        if self.status.is_terminal() {
            return Err(self.reject("cancel"));
        }
        self.status = JobStatus::Cancelled;
        self.message = message.to_owned();
        self.completed_at = Some(now);
        Ok(())
    }

    // ── Views ─────────────────────────────────────────────────────────────────

    pub fn view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            prompt: self.request.prompt.clone(),
            duration: self.request.duration,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id.clone(),
            status: self.status,
            prompt: truncate_prompt(&self.request.prompt),
            duration: self.request.duration,
            created_at: self.created_at,
        }
    }
}

fn truncate_prompt(prompt: &str) -> String {
    match prompt.char_indices().nth(SUMMARY_PROMPT_CHARS) {
        Some((cut, _)) => format!("{}...", &prompt[..cut]),
        None => prompt.to_owned(),
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::*;

    fn job() -> Job {
        Job::queued(
            JobId::from("gen_aaaaaaaaaaaa"),
            Arc::new(GenerationRequest::new("ambient pad")),
            Utc::now(),
        )
    }

    fn result() -> JobResult {
        JobResult {
            location: PathBuf::from("out/gen_aaaaaaaaaaaa.wav"),
            file_size: 1024,
            actual_duration: 5.0,
            sample_rate: 32_000,
        }
    }

    fn assert_invalid(outcome: Result<(), RuntimeError>) {
        assert!(
            matches!(outcome, Err(RuntimeError::InvalidState { .. })),
            "expected InvalidState, got {outcome:?}"
        );
    }

    #[test]
    fn new_job_is_queued() {
        let job = job();
        assert_eq!(job.status(), JobStatus::Queued);
        assert_eq!(job.progress(), 0.0);
        assert_eq!(job.view().message, "Job queued for processing");
        assert!(job.result().is_none() && job.error().is_none());
    }

    #[test]
    fn happy_path_reaches_completed_with_full_progress() {
        let mut job = job();
        job.start(Utc::now()).expect("start");
        assert_eq!(job.status(), JobStatus::Processing);
        assert_eq!(job.progress(), DISPATCHED_PROGRESS);
        assert!(job.view().started_at.is_some());

        job.advance(0.5, "halfway").expect("advance");
        job.complete(result(), Utc::now()).expect("complete");

        let view = job.view();
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.progress, 1.0);
        assert!(view.completed_at.is_some());
        assert_eq!(view.result, Some(result()));
        assert!(view.error.is_none());
    }

    #[test]
    fn progress_never_decreases_and_never_reaches_one_early() {
        let mut job = job();
        job.start(Utc::now()).expect("start");
        job.advance(0.6, "a").expect("advance");
        job.advance(0.4, "b").expect("lower value is ignored, not rejected");
        assert_eq!(job.progress(), 0.6);
        job.advance(1.5, "c").expect("advance");
        assert_eq!(job.progress(), MAX_PENDING_PROGRESS);
    }

    #[test]
    fn progress_rejected_outside_processing() {
        let mut queued = job();
        assert_invalid(queued.advance(0.5, "early"));

        let mut done = job();
        done.start(Utc::now()).expect("start");
        done.complete(result(), Utc::now()).expect("complete");
        assert_invalid(done.advance(0.5, "late"));
        assert_eq!(done.progress(), 1.0);
    }

    #[test]
    fn failure_keeps_progress_and_records_error() {
        let mut job = job();
        job.start(Utc::now()).expect("start");
        job.advance(0.45, "working").expect("advance");
        job.fail("engine exploded", Utc::now()).expect("fail");
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.progress(), 0.45);
        assert_eq!(job.error(), Some("engine exploded"));
        assert!(job.result().is_none());
    }

    #[test]
    fn queued_and_processing_jobs_can_be_cancelled() {
        let mut queued = job();
        queued.cancel(Utc::now()).expect("cancel queued");
        assert_eq!(queued.status(), JobStatus::Cancelled);
        assert_eq!(queued.view().message, "Job cancelled by user");
        assert!(queued.error().is_none());

        let mut running = job();
        running.start(Utc::now()).expect("start");
        running.cancel(Utc::now()).expect("cancel processing");
        assert_eq!(running.status(), JobStatus::Cancelled);
    }

    #[test]
    fn system_cancellation_carries_its_own_message() {
        let mut queued = job();
        queued.cancel_with(MSG_SHUTDOWN, Utc::now()).expect("cancel");
        assert_eq!(queued.status(), JobStatus::Cancelled);
        assert_eq!(queued.view().message, "Job cancelled by shutdown");
        assert_invalid(queued.cancel_with(MSG_SHUTDOWN, Utc::now()));
    }

    #[test]
    fn terminal_jobs_reject_every_transition() {
        let mut cancelled = job();
        cancelled.cancel(Utc::now()).expect("cancel");
        assert_invalid(cancelled.cancel(Utc::now()));
        assert_invalid(cancelled.start(Utc::now()));
        assert_invalid(cancelled.complete(result(), Utc::now()));
        assert_invalid(cancelled.fail("late", Utc::now()));
        assert!(cancelled.result().is_none());

        let mut failed = job();
        failed.start(Utc::now()).expect("start");
        failed.fail("boom", Utc::now()).expect("fail");
        assert_invalid(failed.cancel(Utc::now()));
        assert_eq!(failed.status(), JobStatus::Failed);
    }

    #[test]
    fn queued_job_cannot_complete_directly() {
        let mut job = job();
        assert_invalid(job.complete(result(), Utc::now()));
        assert_invalid(job.fail("nope", Utc::now()));
    }

    #[test]
    fn summary_truncates_long_prompts() {
        let long = "x".repeat(150);
        let job = Job::queued(
            JobId::from("gen_bbbbbbbbbbbb"),
            Arc::new(GenerationRequest::new(long)),
            Utc::now(),
        );
        let summary = job.summary();
        assert_eq!(summary.prompt.len(), 103);
        assert!(summary.prompt.ends_with("..."));

        let short = super::truncate_prompt(&"y".repeat(100));
        assert_eq!(short.len(), 100);
    }
}
