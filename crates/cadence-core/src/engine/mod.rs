//! Inference engines.
//!
//! An engine is an opaque, synchronous and slow function from a
//! [`GenerationRequest`] to an [`AudioBuffer`]. The orchestrator always calls
//! it from the blocking pool.

use std::sync::Arc;

use thiserror::Error;

use crate::runtime::request::GenerationRequest;

#[cfg(feature = "remote")]
pub mod remote;
pub mod sine;

#[cfg(feature = "remote")]
pub use remote::{RemoteConfig, RemoteEngine};
pub use sine::{SineConfig, SineEngine};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine returned unusable audio: {0}")]
    InvalidAudio(String),

    #[error("failed to decode engine audio: {0}")]
    Decode(#[from] hound::Error),

    #[cfg(feature = "remote")]
    #[error("remote engine request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote engine returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Interleaved PCM samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: 1,
            sample_rate,
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Audio length in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }

    /// Reject buffers that cannot be persisted as a meaningful artifact.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidAudio("sample rate is zero".into()));
        }
        if self.channels == 0 {
            return Err(EngineError::InvalidAudio("channel count is zero".into()));
        }
        if self.samples.is_empty() {
            return Err(EngineError::InvalidAudio("buffer is empty".into()));
        }
        if self.samples.len() % self.channels as usize != 0 {
            return Err(EngineError::InvalidAudio(format!(
                "{} samples do not divide into {} channels",
                self.samples.len(),
                self.channels
            )));
        }
        if let Some(index) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(EngineError::InvalidAudio(format!(
                "non-finite sample at index {index}"
            )));
        }
        Ok(())
    }
}

/// A text-to-audio model.
///
/// `generate` must honor the seeding contract: the same request with a
/// `seed` yields the same buffer in the same environment, and requests
/// without one draw fresh randomness every call.
pub trait InferencePort: Send + Sync + 'static {
    /// Short identifier shown in readiness probes and logs.
    fn name(&self) -> &str;

    /// Run the model. Blocks the calling thread for the whole generation.
    fn generate(&self, request: &GenerationRequest) -> Result<AudioBuffer, EngineError>;

    /// Check that the engine can accept work. Blocking.
    fn probe(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Construction-time engine selection.
#[derive(Debug, Clone)]
pub enum EngineConfig {
    Sine(SineConfig),
    #[cfg(feature = "remote")]
    Remote(RemoteConfig),
}

impl EngineConfig {
    pub fn build(self) -> Arc<dyn InferencePort> {
        match self {
            EngineConfig::Sine(config) => Arc::new(SineEngine::new(config)),
            #[cfg(feature = "remote")]
            EngineConfig::Remote(config) => Arc::new(RemoteEngine::new(config)),
        }
    }
}
