use cadence_core::{GenerationRequest, JobPage, JobStatusView, JobSummary, JobTicket};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default page size of `GET /api/v1/jobs`.
pub const DEFAULT_LIST_LIMIT: usize = 50;

pub fn download_url(job_id: &str) -> String {
    format!("/api/v1/download/{job_id}")
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerationRequestBody {
    /// Text description of the audio to generate (1 to 500 characters).
    #[schema(example = "lofi hip hop beat with soft piano")]
    pub prompt: String,
    /// Seconds of audio, 5 to 120 (default 30).
    #[schema(example = 30.0)]
    pub duration: Option<f32>,
    /// Sampling temperature, 0.1 to 2.0 (default 1.0).
    pub temperature: Option<f32>,
    /// Top-k sampling, 1 to 1000 (default 250).
    pub top_k: Option<u32>,
    /// Top-p sampling, 0.0 to 1.0; 0 disables it (default 0).
    pub top_p: Option<f32>,
    /// Classifier-free guidance, 1.0 to 10.0 (default 3.0).
    #[serde(alias = "guidance")]
    pub cfg_coef: Option<f32>,
    /// Fixed seed (0 to 4294967295) for reproducible output.
    pub seed: Option<u64>,
}

impl From<GenerationRequestBody> for GenerationRequest {
    fn from(body: GenerationRequestBody) -> Self {
        let defaults = GenerationRequest::new(body.prompt);
        GenerationRequest {
            duration: body.duration.unwrap_or(defaults.duration),
            temperature: body.temperature.unwrap_or(defaults.temperature),
            top_k: body.top_k.unwrap_or(defaults.top_k),
            top_p: body.top_p.unwrap_or(defaults.top_p),
            guidance: body.cfg_coef.unwrap_or(defaults.guidance),
            seed: body.seed,
            ..defaults
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerationResponse {
    pub job_id: String,
    pub status: String,
    pub message: String,
    pub created_at: String,
    pub estimated_completion: Option<String>,
}

impl From<JobTicket> for GenerationResponse {
    fn from(ticket: JobTicket) -> Self {
        Self {
            job_id: ticket.job_id.to_string(),
            status: ticket.status.to_string(),
            message: ticket.message,
            created_at: ticket.created_at.to_rfc3339(),
            estimated_completion: ticket.estimated_completion.map(|at| at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerationStatusResponse {
    pub job_id: String,
    pub status: String,
    /// 0.0 to 1.0; exactly 1.0 once completed.
    pub progress: f32,
    pub message: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub prompt: String,
    pub duration: f32,
    /// Present once the job is completed.
    pub audio_url: Option<String>,
    pub file_size: Option<u64>,
    pub actual_duration: Option<f32>,
    pub sample_rate: Option<u32>,
    pub error_message: Option<String>,
}

impl From<JobStatusView> for GenerationStatusResponse {
    fn from(view: JobStatusView) -> Self {
        let job_id = view.job_id.to_string();
        let result = view.result.as_ref();
        Self {
            audio_url: result.map(|_| download_url(&job_id)),
            file_size: result.map(|r| r.file_size),
            actual_duration: result.map(|r| r.actual_duration),
            sample_rate: result.map(|r| r.sample_rate),
            job_id,
            status: view.status.to_string(),
            progress: view.progress,
            message: view.message,
            created_at: view.created_at.to_rfc3339(),
            started_at: view.started_at.map(|at| at.to_rfc3339()),
            completed_at: view.completed_at.map(|at| at.to_rfc3339()),
            prompt: view.prompt,
            duration: view.duration,
            error_message: view.error,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JobListQuery {
    /// Maximum number of jobs returned (default 50).
    pub limit: Option<usize>,
    /// Only jobs in this status (`queued`, `processing`, `completed`,
    /// `failed`, `cancelled`).
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobSummaryResponse {
    pub job_id: String,
    pub status: String,
    /// Truncated to 100 characters.
    pub prompt: String,
    pub duration: f32,
    pub created_at: String,
}

impl From<JobSummary> for JobSummaryResponse {
    fn from(summary: JobSummary) -> Self {
        Self {
            job_id: summary.job_id.to_string(),
            status: summary.status.to_string(),
            prompt: summary.prompt,
            duration: summary.duration,
            created_at: summary.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobSummaryResponse>,
    /// Matching jobs before `limit` was applied.
    pub total: usize,
}

impl From<JobPage> for JobListResponse {
    fn from(page: JobPage) -> Self {
        Self {
            jobs: page.jobs.into_iter().map(Into::into).collect(),
            total: page.total,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
