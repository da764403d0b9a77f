//! Synthetic progress reporting.
//!
//! Engines give no progress signal, so while an inference call is in flight
//! the orchestrator walks the job's progress linearly from
//! [`ProgressConfig::start`] to [`ProgressConfig::end`] over the estimated
//! wall time. The reporter is a plain future; the orchestrator stops it by
//! dropping it.

use std::future::Future;
use std::time::Duration;

use crate::runtime::state::MAX_PENDING_PROGRESS;

/// Shape of the synthetic progress curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressConfig {
    /// Progress written when inference begins.
    pub start: f32,
    /// Progress reached after the last step; clamped below 1.0.
    pub end: f32,
    /// Number of evenly spaced updates.
    pub steps: u32,
    /// Expected wall seconds per second of generated audio.
    pub realtime_factor: f32,
    /// Lower bound of the total estimate.
    pub min_estimate: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            start: 0.3,
            end: 0.75,
            steps: 20,
            realtime_factor: 2.0,
            min_estimate: Duration::from_secs(10),
        }
    }
}

impl ProgressConfig {
    /// Expected wall time to generate `audio_secs` seconds of audio.
    pub fn estimate(&self, audio_secs: f32) -> Duration {
        let secs = audio_secs * self.realtime_factor;
        if !secs.is_finite() || secs <= 0.0 {
            return self.min_estimate;
        }
        Duration::try_from_secs_f32(secs)
            .unwrap_or(self.min_estimate)
            .max(self.min_estimate)
    }

    /// Concrete schedule for one job.
    pub fn plan(&self, audio_secs: f32) -> ProgressPlan {
        let end = self.end.clamp(0.0, MAX_PENDING_PROGRESS);
        let start = self.start.clamp(0.0, end);
        let steps = self.steps.max(1);
        ProgressPlan {
            start,
            end,
            steps,
            interval: self.estimate(audio_secs) / steps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressPlan {
    pub start: f32,
    pub end: f32,
    pub steps: u32,
    pub interval: Duration,
}

impl ProgressPlan {
    /// Value reported at 1-based `step`; step 0 is the start value.
    pub fn value_at(&self, step: u32) -> f32 {
        let fraction = step.min(self.steps) as f32 / self.steps as f32;
        self.start + (self.end - self.start) * fraction
    }
}

/// Human-readable status line for a progress value.
pub fn progress_message(value: f32) -> String {
    format!("AI generating audio... {}%", (value * 100.0).round() as u32)
}

/// Emit every step of `plan`, one per `plan.interval`.
///
/// `apply` returns `false` when the update was refused (e.g. the job already
/// left `processing`), which ends the run early.
pub async fn report<F, Fut>(plan: ProgressPlan, mut apply: F)
where
    F: FnMut(f32) -> Fut,
    Fut: Future<Output = bool>,
{
    for step in 1..=plan.steps {
        tokio::time::sleep(plan.interval).await;
        if !apply(plan.value_at(step)).await {
            tracing::debug!(step, "progress update refused, stopping reporter");
            return;
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn estimate_has_a_floor() {
        let config = ProgressConfig::default();
        assert_eq!(config.estimate(30.0), Duration::from_secs(60));
        assert_eq!(config.estimate(2.0), Duration::from_secs(10));
        assert_eq!(config.estimate(f32::NAN), Duration::from_secs(10));
    }

    #[test]
    fn plan_interpolates_linearly() {
        let plan = ProgressConfig::default().plan(30.0);
        assert_eq!(plan.interval, Duration::from_secs(3));
        assert_eq!(plan.value_at(0), 0.3);
        assert!((plan.value_at(10) - 0.525).abs() < 1e-6);
        assert!((plan.value_at(20) - 0.75).abs() < 1e-6);
        assert!((plan.value_at(99) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn end_is_clamped_below_one() {
        let config = ProgressConfig {
            start: 1.2,
            end: 1.0,
            steps: 0,
            ..ProgressConfig::default()
        };
        let plan = config.plan(5.0);
        assert_eq!(plan.end, MAX_PENDING_PROGRESS);
        assert_eq!(plan.start, MAX_PENDING_PROGRESS);
        assert_eq!(plan.steps, 1);
    }

    #[test]
    fn message_shows_rounded_percentage() {
        assert_eq!(progress_message(0.3), "AI generating audio... 30%");
        assert_eq!(progress_message(0.748), "AI generating audio... 75%");
    }

    #[tokio::test]
    async fn reporter_emits_monotonic_values() {
        let plan = ProgressConfig {
            steps: 5,
            min_estimate: Duration::from_millis(25),
            realtime_factor: 0.0,
            ..ProgressConfig::default()
        }
        .plan(10.0);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        report(plan, |value| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().expect("lock").push(value);
                true
            }
        })
        .await;

        let seen = seen.lock().expect("lock").clone();
        assert_eq!(seen.len(), 5);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!((seen[4] - 0.75).abs() < 1e-6);
    }

    #[tokio::test]
    async fn reporter_stops_when_update_is_refused() {
        let plan = ProgressConfig {
            steps: 10,
            min_estimate: Duration::from_millis(10),
            realtime_factor: 0.0,
            ..ProgressConfig::default()
        }
        .plan(1.0);

        let mut calls = 0;
        report(plan, |_| {
            calls += 1;
            let accept = calls < 3;
            async move { accept }
        })
        .await;
        assert_eq!(calls, 3);
    }
}
