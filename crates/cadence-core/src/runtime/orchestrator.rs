use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::artifact::{ArtifactError, ResultStore};
use crate::engine::{AudioBuffer, InferencePort};
use crate::runtime::admission::{DispatchGate, DispatchPermit};
use crate::runtime::progress::{self, ProgressConfig, progress_message};
use crate::runtime::request::GenerationRequest;
use crate::runtime::state::MSG_SHUTDOWN;
use crate::runtime::storage::{JobStore, MemoryJobStore};
use crate::runtime::types::{
    JobId, JobPage, JobResult, JobStatus, JobStatusView, JobTicket, RuntimeError,
};

/// Progress written while the artifact is being persisted.
const SAVING_PROGRESS: f32 = 0.8;
const MSG_MODEL_STARTED: &str = "AI model processing prompt...";
const MSG_SAVING: &str = "Saving audio file...";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Jobs allowed to run inference at the same time.
    pub max_concurrent_jobs: usize,
    pub progress: ProgressConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            progress: ProgressConfig::default(),
        }
    }
}

type CancelSenders = Arc<Mutex<HashMap<JobId, Arc<watch::Sender<bool>>>>>;

/// The job orchestrator.
///
/// Accepts generation requests, runs each one as an independent background
/// unit and records every state change in the [`JobStore`]. Handles are
/// cheap to clone and share the same store, engine and dispatch gate.
///
/// # Usage
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::new(engine, artifacts, OrchestratorConfig::default());
/// let ticket = orchestrator.submit_job(GenerationRequest::new("rain")).await?;
/// let view = orchestrator.get_status(&ticket.job_id).await?;
/// ```
pub struct Orchestrator<S: JobStore = MemoryJobStore> {
    store: Arc<S>,
    engine: Arc<dyn InferencePort>,
    artifacts: Arc<dyn ResultStore>,
    gate: DispatchGate,
    /// Cancellation signal per job with a live background unit.
    cancellations: CancelSenders,
    config: OrchestratorConfig,
}

impl<S: JobStore> Clone for Orchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            engine: Arc::clone(&self.engine),
            artifacts: Arc::clone(&self.artifacts),
            gate: self.gate.clone(),
            cancellations: Arc::clone(&self.cancellations),
            config: self.config.clone(),
        }
    }
}

impl<S: JobStore> std::fmt::Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("engine", &self.engine.name())
            .field("gate", &self.gate)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator<MemoryJobStore> {
    /// Orchestrator over a fresh in-memory job store.
    pub fn new(
        engine: Arc<dyn InferencePort>,
        artifacts: Arc<dyn ResultStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self::with_store(MemoryJobStore::new(), engine, artifacts, config)
    }
}

impl<S: JobStore> Orchestrator<S> {
    pub fn with_store(
        store: S,
        engine: Arc<dyn InferencePort>,
        artifacts: Arc<dyn ResultStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store: Arc::new(store),
            engine,
            artifacts,
            gate: DispatchGate::new(config.max_concurrent_jobs),
            cancellations: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    /// Validate `request`, record a `queued` job and start its background
    /// unit. Returns without waiting for inference.
    pub async fn submit_job(&self, request: GenerationRequest) -> Result<JobTicket, RuntimeError> {
        let request = Arc::new(request.validated()?);
        let job = self.store.create(Arc::clone(&request)).await?;
        let job_id = job.id().clone();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.register_cancel(&job_id, cancel_tx);

        let estimate = self.config.progress.estimate(request.duration);
        let estimated_completion = chrono::Duration::from_std(estimate)
            .ok()
            .map(|delta| job.created_at() + delta);

        let unit = self.clone();
        let span = info_span!("job", job_id = %job_id);
        let unit_id = job_id.clone();
        tokio::spawn(
            async move {
                unit.execute_job(unit_id, request, cancel_rx).await;
            }
            .instrument(span),
        );

        info!(
            job_id = %job_id,
            duration = job.request().duration,
            seeded = job.request().seed.is_some(),
            "job submitted"
        );
        let view = job.view();
        Ok(JobTicket {
            job_id,
            status: view.status,
            message: view.message,
            created_at: view.created_at,
            estimated_completion,
        })
    }

    /// Snapshot of one job.
    pub async fn get_status(&self, job_id: &JobId) -> Result<JobStatusView, RuntimeError> {
        Ok(self.store.get(job_id).await?.view())
    }

    /// Move a `queued` or `processing` job to `cancelled`.
    ///
    /// An in-flight inference call is not interrupted; its output is
    /// discarded when it returns.
    pub async fn cancel_job(&self, job_id: &JobId) -> Result<(), RuntimeError> {
        self.store
            .update(job_id, |job| job.cancel(Utc::now()))
            .await?;
        if let Some(tx) = self.cancel_sender(job_id) {
            let _ = tx.send(true);
        }
        info!(job_id = %job_id, "job cancelled");
        Ok(())
    }

    /// Newest-first page of jobs. Never fails.
    pub async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> JobPage {
        self.store.list(status, limit).await
    }

    /// Encoded artifact of a completed job.
    pub async fn download_result(&self, job_id: &JobId) -> Result<Vec<u8>, RuntimeError> {
        let job = self.store.get(job_id).await?;
        if job.status() != JobStatus::Completed {
            return Err(RuntimeError::InvalidState {
                job_id: job_id.clone(),
                status: job.status(),
                action: "download",
            });
        }

        let artifacts = Arc::clone(&self.artifacts);
        let id = job_id.clone();
        tokio::task::spawn_blocking(move || artifacts.open(&id))
            .await
            .map_err(|_| RuntimeError::PersistenceFailure("artifact read task panicked".into()))?
            .map_err(|err| match err {
                ArtifactError::Missing(_) => RuntimeError::NotFound {
                    job_id: job_id.clone(),
                },
                other => RuntimeError::PersistenceFailure(other.to_string()),
            })
    }

    /// Name of the configured engine.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Ask the engine whether it can take work.
    pub async fn probe_engine(&self) -> Result<(), RuntimeError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.probe())
            .await
            .map_err(|_| RuntimeError::InferenceFailure("engine probe panicked".into()))?
            .map_err(|err| RuntimeError::InferenceFailure(err.to_string()))
    }

    /// Stop dispatching. Jobs still waiting for a slot end up `cancelled`;
    /// jobs already processing run to completion.
    pub fn shutdown(&self) {
        self.gate.close();
        info!("orchestrator stopped dispatching");
    }

    /// Whether the background unit of `job_id` is still running.
    pub fn is_running(&self, job_id: &JobId) -> bool {
        self.cancel_sender(job_id).is_some()
    }

    // ── Background unit ───────────────────────────────────────────────────────

    /// Drive one job from `queued` to a terminal state.
    async fn execute_job(
        self,
        job_id: JobId,
        request: Arc<GenerationRequest>,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        if let Some(_permit) = self.dispatch(&job_id, &mut cancel_rx).await {
            self.run_job(&job_id, &request, &mut cancel_rx).await;
        }
        self.forget_cancel(&job_id);
    }

    /// Wait for a dispatch slot and move the job to `processing`.
    ///
    /// Returns `None` when the job was cancelled meanwhile.
    async fn dispatch(
        &self,
        job_id: &JobId,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Option<DispatchPermit> {
        let permit = tokio::select! {
            biased;
            _ = cancelled(cancel_rx) => {
                debug!("cancelled while waiting for dispatch");
                return None;
            }
            permit = self.gate.acquire() => permit,
        };

        let permit = match permit {
            Ok(permit) => permit,
            Err(err) => {
                // Shutdown: the job never started, so it can only be cancelled.
                warn!(error = %err, "dispatch gate closed");
                let _ = self
                    .store
                    .update(job_id, |job| job.cancel_with(MSG_SHUTDOWN, Utc::now()))
                    .await;
                return None;
            }
        };

        match self.store.update(job_id, |job| job.start(Utc::now())).await {
            Ok(()) => {
                info!(free_slots = self.gate.available(), "job processing");
                Some(permit)
            }
            Err(err) => {
                debug!(error = %err, "job left the queue before dispatch");
                None
            }
        }
    }

    async fn run_job(
        &self,
        job_id: &JobId,
        request: &Arc<GenerationRequest>,
        cancel_rx: &mut watch::Receiver<bool>,
    ) {
        let audio = match self.infer(job_id, request, cancel_rx).await {
            Ok(audio) => audio,
            Err(err) => return self.fail(job_id, err).await,
        };

        if *cancel_rx.borrow() {
            info!("discarding output of cancelled job");
            return;
        }

        let _ = self
            .store
            .update(job_id, |job| job.advance(SAVING_PROGRESS, MSG_SAVING))
            .await;

        let actual_duration = audio.duration_secs();
        let sample_rate = audio.sample_rate;
        let stored = match self.persist(job_id, audio).await {
            Ok(stored) => stored,
            Err(err) => return self.fail(job_id, err).await,
        };

        let result = JobResult {
            location: stored.location,
            file_size: stored.file_size,
            actual_duration,
            sample_rate,
        };
        match self
            .store
            .update(job_id, |job| job.complete(result, Utc::now()))
            .await
        {
            Ok(()) => info!(
                file_size = stored.file_size,
                actual_duration, "job completed"
            ),
            Err(err) => {
                // Cancelled while the artifact was being written.
                info!(error = %err, "job left processing during persist, removing artifact");
                self.discard_artifact(job_id).await;
            }
        }
    }

    /// Run the engine on the blocking pool while the progress reporter ticks.
    ///
    /// The reporter is dropped as soon as the engine call resolves, and
    /// earlier if the job is cancelled.
    async fn infer(
        &self,
        job_id: &JobId,
        request: &Arc<GenerationRequest>,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<AudioBuffer, RuntimeError> {
        let plan = self.config.progress.plan(request.duration);
        let _ = self
            .store
            .update(job_id, |job| job.advance(plan.start, MSG_MODEL_STARTED))
            .await;

        let engine = Arc::clone(&self.engine);
        let input = Arc::clone(request);
        let inference = tokio::task::spawn_blocking(move || engine.generate(&input));

        let joined = {
            let store = Arc::clone(&self.store);
            let reporter = progress::report(plan, |value| {
                let store = Arc::clone(&store);
                let id = job_id.clone();
                async move {
                    store
                        .update(&id, |job| job.advance(value, progress_message(value)))
                        .await
                        .is_ok()
                }
            });
            tokio::pin!(inference);
            tokio::pin!(reporter);

            let mut reporting = true;
            loop {
                tokio::select! {
                    joined = &mut inference => break joined,
                    _ = &mut reporter, if reporting => reporting = false,
                    _ = cancelled(cancel_rx), if reporting => {
                        debug!("progress reporting stopped by cancellation");
                        reporting = false;
                    }
                }
            }
        };

        let audio = joined
            .map_err(|_| RuntimeError::InferenceFailure("inference task panicked".into()))?
            .map_err(|err| RuntimeError::InferenceFailure(err.to_string()))?;
        audio
            .check()
            .map_err(|err| RuntimeError::InferenceFailure(err.to_string()))?;
        Ok(audio)
    }

    async fn persist(
        &self,
        job_id: &JobId,
        audio: AudioBuffer,
    ) -> Result<crate::artifact::StoredArtifact, RuntimeError> {
        let artifacts = Arc::clone(&self.artifacts);
        let id = job_id.clone();
        tokio::task::spawn_blocking(move || artifacts.persist(&audio, &id))
            .await
            .map_err(|_| RuntimeError::PersistenceFailure("persist task panicked".into()))?
            .map_err(|err| RuntimeError::PersistenceFailure(err.to_string()))
    }

    async fn fail(&self, job_id: &JobId, err: RuntimeError) {
        let message = err.to_string();
        match self
            .store
            .update(job_id, |job| job.fail(message, Utc::now()))
            .await
        {
            Ok(()) => error!(error = %err, "job failed"),
            Err(rejected) => debug!(error = %err, reason = %rejected, "failure not recorded"),
        }
    }

    async fn discard_artifact(&self, job_id: &JobId) {
        let artifacts = Arc::clone(&self.artifacts);
        let id = job_id.clone();
        match tokio::task::spawn_blocking(move || artifacts.remove(&id)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "could not remove discarded artifact"),
            Err(_) => warn!("artifact removal task panicked"),
        }
    }

    // ── Cancellation signals ──────────────────────────────────────────────────

    fn register_cancel(&self, job_id: &JobId, tx: watch::Sender<bool>) {
        if let Ok(mut senders) = self.cancellations.lock() {
            senders.insert(job_id.clone(), Arc::new(tx));
        }
    }

    fn cancel_sender(&self, job_id: &JobId) -> Option<Arc<watch::Sender<bool>>> {
        self.cancellations
            .lock()
            .ok()
            .and_then(|senders| senders.get(job_id).cloned())
    }

    fn forget_cancel(&self, job_id: &JobId) {
        if let Ok(mut senders) = self.cancellations.lock() {
            senders.remove(job_id);
        }
    }
}

/// Resolves once the job is flagged as cancelled. Pends forever if the
/// sender is gone without a cancellation.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}
