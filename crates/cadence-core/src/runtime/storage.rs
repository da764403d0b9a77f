use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::runtime::request::GenerationRequest;
use crate::runtime::state::Job;
use crate::runtime::types::{JobId, JobPage, JobStatus, RuntimeError};

/// How many freshly drawn ids may collide before creation gives up.
pub const MAX_ID_ATTEMPTS: usize = 8;

/// Authoritative mapping from job id to job record.
///
/// Implementations must apply [`update`](Self::update) atomically: the
/// mutation sees the current record, and its changes become visible to
/// readers all at once, or not at all when it returns an error.
pub trait JobStore: Send + Sync + 'static {
    /// Insert a fresh `queued` record under a newly allocated id.
    fn create(
        &self,
        request: Arc<GenerationRequest>,
    ) -> impl Future<Output = Result<Job, RuntimeError>> + Send;

    /// Snapshot of a single record.
    fn get(&self, id: &JobId) -> impl Future<Output = Result<Job, RuntimeError>> + Send;

    /// Apply `mutation` to the record and commit it only if it returns `Ok`.
    fn update<F, T>(
        &self,
        id: &JobId,
        mutation: F,
    ) -> impl Future<Output = Result<T, RuntimeError>> + Send
    where
        F: FnOnce(&mut Job) -> Result<T, RuntimeError> + Send,
        T: Send;

    /// Newest-first page of jobs, optionally restricted to one status.
    fn list(&self, status: Option<JobStatus>, limit: usize) -> impl Future<Output = JobPage> + Send;
}

#[derive(Debug)]
struct Entry {
    /// Insertion order, used to break `created_at` ties.
    seq: u64,
    job: Job,
}

/// In-memory [`JobStore`] backed by a `tokio::sync::RwLock<HashMap>`.
///
/// Many readers can observe job status concurrently while background units
/// and cancellation requests take the write lock for their short mutations.
/// Records are kept for the lifetime of the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    inner: Arc<RwLock<HashMap<JobId, Entry>>>,
    next_seq: Arc<AtomicU64>,
}

impl MemoryJobStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Insert `job` unless its id is already taken. Returns whether it was inserted.
    async fn try_insert(&self, job: &Job) -> bool {
        let mut guard = self.inner.write().await;
        if guard.contains_key(job.id()) {
            return false;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        guard.insert(
            job.id().clone(),
            Entry {
                seq,
                job: job.clone(),
            },
        );
        true
    }

    async fn create_with<G>(
        &self,
        request: Arc<GenerationRequest>,
        mut next_id: G,
    ) -> Result<Job, RuntimeError>
    where
        G: FnMut() -> JobId + Send,
    {
        for _ in 0..MAX_ID_ATTEMPTS {
            let job = Job::queued(next_id(), Arc::clone(&request), Utc::now());
            if self.try_insert(&job).await {
                return Ok(job);
            }
            tracing::warn!(job_id = %job.id(), "job id collision, drawing another");
        }
        Err(RuntimeError::IdExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }
}

impl JobStore for MemoryJobStore {
    async fn create(&self, request: Arc<GenerationRequest>) -> Result<Job, RuntimeError> {
        self.create_with(request, JobId::generate).await
    }

    async fn get(&self, id: &JobId) -> Result<Job, RuntimeError> {
        self.inner
            .read()
            .await
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| RuntimeError::NotFound { job_id: id.clone() })
    }

    async fn update<F, T>(&self, id: &JobId, mutation: F) -> Result<T, RuntimeError>
    where
        F: FnOnce(&mut Job) -> Result<T, RuntimeError> + Send,
        T: Send,
    {
        let mut guard = self.inner.write().await;
        let entry = guard
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound { job_id: id.clone() })?;
        // Mutate a draft so a rejected transition leaves the record untouched.
        let mut draft = entry.job.clone();
        let out = mutation(&mut draft)?;
        entry.job = draft;
        Ok(out)
    }

    async fn list(&self, status: Option<JobStatus>, limit: usize) -> JobPage {
        let guard = self.inner.read().await;
        let mut matching: Vec<&Entry> = guard
            .values()
            .filter(|entry| status.is_none_or(|s| entry.job.status() == s))
            .collect();
        matching.sort_by(|a, b| {
            (b.job.created_at(), b.seq).cmp(&(a.job.created_at(), a.seq))
        });
        JobPage {
            total: matching.len(),
            jobs: matching
                .into_iter()
                .take(limit)
                .map(|entry| entry.job.summary())
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    fn request(prompt: &str) -> Arc<GenerationRequest> {
        Arc::new(GenerationRequest::new(prompt))
    }

    #[tokio::test]
    async fn created_jobs_get_unique_ids() {
        let store = MemoryJobStore::new();
        let mut ids = HashSet::new();
        for i in 0..50 {
            let job = store.create(request(&format!("p{i}"))).await.expect("create");
            assert_eq!(job.status(), JobStatus::Queued);
            assert!(ids.insert(job.id().clone()), "duplicate id {}", job.id());
        }
        assert_eq!(store.len().await, 50);
    }

    #[tokio::test]
    async fn colliding_ids_are_redrawn_then_exhausted() {
        let store = MemoryJobStore::new();
        let fixed = || JobId::from("gen_000000000000");

        store.create_with(request("a"), fixed).await.expect("first insert");

        let mut draws = vec![JobId::from("gen_111111111111"), JobId::from("gen_000000000000")];
        let job = store
            .create_with(request("b"), move || draws.pop().expect("draw"))
            .await
            .expect("second draw is free");
        assert_eq!(job.id().as_str(), "gen_111111111111");

        let err = store.create_with(request("c"), fixed).await.unwrap_err();
        assert!(matches!(err, RuntimeError::IdExhausted { attempts: MAX_ID_ATTEMPTS }));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let store = MemoryJobStore::new();
        let missing = JobId::from("gen_ffffffffffff");
        assert!(matches!(store.get(&missing).await, Err(RuntimeError::NotFound { .. })));
        let updated = store.update(&missing, |job| job.start(Utc::now())).await;
        assert!(matches!(updated, Err(RuntimeError::NotFound { .. })));
    }

    #[tokio::test]
    async fn rejected_mutation_leaves_record_untouched() {
        let store = MemoryJobStore::new();
        let job = store.create(request("pad")).await.expect("create");

        let outcome = store
            .update(job.id(), |job| {
                job.start(Utc::now())?;
                // Fails after the draft was already moved to processing.
                job.start(Utc::now())
            })
            .await;
        assert!(matches!(outcome, Err(RuntimeError::InvalidState { .. })));

        let stored = store.get(job.id()).await.expect("get");
        assert_eq!(stored.status(), JobStatus::Queued);
        assert_eq!(stored.progress(), 0.0);
    }

    #[tokio::test]
    async fn list_is_newest_first_with_filter_and_limit() {
        let store = MemoryJobStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(store.create(request(&format!("job {i}"))).await.expect("create").id().clone());
        }
        store.update(&ids[1], |job| job.cancel(Utc::now())).await.expect("cancel");
        store.update(&ids[3], |job| job.cancel(Utc::now())).await.expect("cancel");

        let page = store.list(None, 3).await;
        assert_eq!(page.total, 5);
        let listed: Vec<_> = page.jobs.iter().map(|s| s.job_id.clone()).collect();
        assert_eq!(listed, vec![ids[4].clone(), ids[3].clone(), ids[2].clone()]);

        let cancelled = store.list(Some(JobStatus::Cancelled), 50).await;
        assert_eq!(cancelled.total, 2);
        assert_eq!(cancelled.jobs[0].job_id, ids[3]);
        assert_eq!(cancelled.jobs[1].job_id, ids[1]);

        let none = store.list(Some(JobStatus::Completed), 50).await;
        assert_eq!(none.total, 0);
        assert!(none.jobs.is_empty());
    }
}
