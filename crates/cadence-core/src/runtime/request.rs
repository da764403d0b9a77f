use std::borrow::Cow;

use validator::{Validate, ValidationError};

use crate::runtime::types::RuntimeError;

pub const DEFAULT_DURATION: f32 = 30.0;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_TOP_K: u32 = 250;
pub const DEFAULT_TOP_P: f32 = 0.0;
pub const DEFAULT_GUIDANCE: f32 = 3.0;

/// Input of a single generation job.
///
/// Built once at submission and never mutated afterwards; the orchestrator
/// shares it behind an `Arc` between the job record and the background unit.
#[derive(Debug, Clone, PartialEq, Validate)]
#[validate(schema(function = "validate_finite"))]
pub struct GenerationRequest {
    /// Text description of the audio to generate. Stored trimmed.
    #[validate(
        length(min = 1, max = 500, message = "prompt must be 1 to 500 characters"),
        custom(function = "validate_prompt")
    )]
    pub prompt: String,

    /// Length of the generated audio, in seconds.
    #[validate(range(min = 5.0, max = 120.0, message = "duration must be between 5 and 120 seconds"))]
    pub duration: f32,

    #[validate(range(min = 0.1, max = 2.0, message = "temperature must be between 0.1 and 2.0"))]
    pub temperature: f32,

    #[validate(range(min = 1, max = 1000, message = "top_k must be between 1 and 1000"))]
    pub top_k: u32,

    /// Nucleus sampling threshold; `0.0` disables it.
    #[validate(range(min = 0.0, max = 1.0, message = "top_p must be between 0.0 and 1.0"))]
    pub top_p: f32,

    /// Classifier-free guidance coefficient.
    #[validate(range(min = 1.0, max = 10.0, message = "guidance must be between 1.0 and 10.0"))]
    pub guidance: f32,

    /// Fixes the engine's randomness. Absent means every run differs.
    #[validate(range(max = 4_294_967_295u64, message = "seed must fit in 32 bits"))]
    pub seed: Option<u64>,
}

impl GenerationRequest {
    /// Request with every optional parameter at its default.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            duration: DEFAULT_DURATION,
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
            top_p: DEFAULT_TOP_P,
            guidance: DEFAULT_GUIDANCE,
            seed: None,
        }
    }

    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_guidance(mut self, guidance: f32) -> Self {
        self.guidance = guidance;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Trim the prompt and check every field against its allowed range.
    pub fn validated(mut self) -> Result<Self, RuntimeError> {
        let trimmed = self.prompt.trim();
        if trimmed.len() != self.prompt.len() {
            self.prompt = trimmed.to_owned();
        }
        self.validate()
            .map_err(|errors| RuntimeError::Validation(errors.to_string()))?;
        Ok(self)
    }
}

fn validate_prompt(prompt: &str) -> Result<(), ValidationError> {
    if prompt.trim().is_empty() {
        return Err(ValidationError::new("blank_prompt")
            .with_message(Cow::Borrowed("prompt cannot be empty")));
    }
    Ok(())
}

// NaN slips through range checks, so floats are checked separately.
fn validate_finite(request: &GenerationRequest) -> Result<(), ValidationError> {
    let fields = [
        request.duration,
        request.temperature,
        request.top_p,
        request.guidance,
    ];
    if fields.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(ValidationError::new("non_finite")
            .with_message(Cow::Borrowed("numeric parameters must be finite")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rejects(request: GenerationRequest) -> String {
        match request.validated() {
            Err(RuntimeError::Validation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let request = GenerationRequest::new("rain on a tin roof");
        assert_eq!(request.duration, 30.0);
        assert_eq!(request.temperature, 1.0);
        assert_eq!(request.top_k, 250);
        assert_eq!(request.top_p, 0.0);
        assert_eq!(request.guidance, 3.0);
        assert_eq!(request.seed, None);
        assert!(request.validated().is_ok());
    }

    #[test]
    fn prompt_is_trimmed() {
        let request = GenerationRequest::new("  lofi piano  ")
            .validated()
            .expect("valid");
        assert_eq!(request.prompt, "lofi piano");
    }

    #[test]
    fn blank_and_oversized_prompts_are_rejected() {
        rejects(GenerationRequest::new("   "));
        rejects(GenerationRequest::new(""));
        rejects(GenerationRequest::new("a".repeat(501)));
        assert!(GenerationRequest::new("é".repeat(500)).validated().is_ok());
    }

    #[test]
    fn zero_duration_is_rejected() {
        let message = rejects(GenerationRequest::new("simple test tone").with_duration(0.0));
        assert!(message.contains("duration"), "message: {message}");
    }

    #[test]
    fn range_boundaries_are_inclusive() {
        let request = GenerationRequest::new("edge")
            .with_duration(120.0)
            .with_temperature(0.1)
            .with_top_k(1000)
            .with_top_p(1.0)
            .with_guidance(10.0)
            .with_seed(u32::MAX as u64);
        assert!(request.validated().is_ok());
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        rejects(GenerationRequest::new("x").with_duration(121.0));
        rejects(GenerationRequest::new("x").with_temperature(0.0));
        rejects(GenerationRequest::new("x").with_top_k(0));
        rejects(GenerationRequest::new("x").with_top_p(1.5));
        rejects(GenerationRequest::new("x").with_guidance(0.5));
        rejects(GenerationRequest::new("x").with_seed(u32::MAX as u64 + 1));
    }

    #[test]
    fn seed_is_bounded_to_32_bits() {
        let message = rejects(GenerationRequest::new("x").with_seed(1 << 40));
        assert!(message.contains("seed"), "message: {message}");
        assert!(GenerationRequest::new("x").with_seed(0).validated().is_ok());
    }

    #[test]
    fn non_finite_parameters_are_rejected() {
        rejects(GenerationRequest::new("x").with_temperature(f32::NAN));
        rejects(GenerationRequest::new("x").with_duration(f32::INFINITY));
    }
}
