//! Model-free engine that renders a tone, so the service runs without
//! weights. The tone and its dither are derived from the request, which
//! makes it a faithful stand-in for the seeding contract.

use std::f32::consts::TAU;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::engine::{AudioBuffer, EngineError, InferencePort};
use crate::runtime::request::GenerationRequest;

const AMPLITUDE: f32 = 0.3;
/// Dither amplitude at temperature 1.0.
const BASE_DITHER: f32 = 0.02;
/// A4 up to A5 in semitones.
const TONES_HZ: [f32; 13] = [
    440.0, 466.16, 493.88, 523.25, 554.37, 587.33, 622.25, 659.26, 698.46, 739.99, 783.99, 830.61,
    880.0,
];

#[derive(Debug, Clone)]
pub struct SineConfig {
    pub sample_rate: u32,
    /// Wall seconds spent per second of generated audio, to imitate a model.
    pub latency_factor: f32,
}

impl Default for SineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 32_000,
            latency_factor: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SineEngine {
    config: SineConfig,
}

impl SineEngine {
    pub fn new(config: SineConfig) -> Self {
        Self { config }
    }
}

/// Stable hash of everything in the request except the seed.
fn fingerprint(request: &GenerationRequest) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(request.prompt.as_bytes());
    hasher.update(request.duration.to_le_bytes());
    hasher.update(request.temperature.to_le_bytes());
    hasher.update(request.top_k.to_le_bytes());
    hasher.update(request.top_p.to_le_bytes());
    hasher.update(request.guidance.to_le_bytes());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

impl InferencePort for SineEngine {
    fn name(&self) -> &str {
        "sine"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<AudioBuffer, EngineError> {
        let sample_rate = self.config.sample_rate;
        if sample_rate == 0 {
            return Err(EngineError::InvalidAudio("sample rate is zero".into()));
        }

        let latency = request.duration * self.config.latency_factor;
        if latency > 0.0 {
            if let Ok(pause) = Duration::try_from_secs_f32(latency) {
                std::thread::sleep(pause);
            }
        }

        let print = fingerprint(request);
        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ print),
            None => StdRng::from_os_rng(),
        };
        let frequency = TONES_HZ[(print % TONES_HZ.len() as u64) as usize];
        let dither = BASE_DITHER * request.temperature;
        let frames = (request.duration * sample_rate as f32).round() as usize;

        let samples = (0..frames)
            .map(|n| {
                let t = n as f32 / sample_rate as f32;
                let tone = AMPLITUDE * (TAU * frequency * t).sin();
                (tone + dither * rng.random_range(-1.0f32..=1.0)).clamp(-1.0, 1.0)
            })
            .collect();

        Ok(AudioBuffer::mono(samples, sample_rate))
    }
}
