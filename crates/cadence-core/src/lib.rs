//! Asynchronous text-to-audio job orchestration.
//!
//! A caller submits a [`GenerationRequest`] to the [`Orchestrator`] and gets a
//! [`JobTicket`] back immediately. The slow inference call runs on the
//! blocking pool while a synthetic progress reporter keeps the job record
//! moving; the caller polls [`Orchestrator::get_status`] and finally fetches
//! the WAV artifact with [`Orchestrator::download_result`].

mod runtime;

pub mod artifact;
pub mod engine;

pub use runtime::orchestrator::{Orchestrator, OrchestratorConfig};
pub use runtime::progress::ProgressConfig;
pub use runtime::request::GenerationRequest;
pub use runtime::state::Job;
pub use runtime::storage::{JobStore, MemoryJobStore};
pub use runtime::types::{
    JobId, JobPage, JobResult, JobStatus, JobStatusView, JobSummary, JobTicket, RuntimeError,
};
