//! Engine backed by a model sidecar over HTTP.
//!
//! The sidecar accepts `POST {base_url}/generate` with the request as JSON
//! and answers with a WAV body. `GET {base_url}/health` is used as the
//! readiness probe.

use std::time::Duration;

use serde::Serialize;

use crate::artifact::wav;
use crate::engine::{AudioBuffer, EngineError, InferencePort};
use crate::runtime::request::GenerationRequest;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Upper bound for one generation call.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct RemoteRequest<'a> {
    prompt: &'a str,
    duration: f32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    cfg_coef: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

impl<'a> From<&'a GenerationRequest> for RemoteRequest<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            prompt: &request.prompt,
            duration: request.duration,
            temperature: request.temperature,
            top_k: request.top_k,
            top_p: request.top_p,
            cfg_coef: request.guidance,
            seed: request.seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteEngine {
    config: RemoteConfig,
}

impl RemoteEngine {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    // Built per call: a blocking client must not be dropped inside the async
    // runtime, and calls always arrive on the blocking pool.
    fn client(&self, timeout: Duration) -> Result<reqwest::blocking::Client, EngineError> {
        Ok(reqwest::blocking::Client::builder().timeout(timeout).build()?)
    }
}

impl InferencePort for RemoteEngine {
    fn name(&self) -> &str {
        "remote"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<AudioBuffer, EngineError> {
        let url = self.endpoint("generate");
        tracing::debug!(%url, duration = request.duration, "calling remote engine");

        let response = self
            .client(self.config.timeout)?
            .post(&url)
            .json(&RemoteRequest::from(request))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EngineError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes()?;
        Ok(wav::decode(&bytes)?)
    }

    fn probe(&self) -> Result<(), EngineError> {
        let response = self.client(PROBE_TIMEOUT)?.get(self.endpoint("health")).send()?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(EngineError::Unavailable(format!(
                "health check returned HTTP {}",
                response.status().as_u16()
            )))
        }
    }
}
