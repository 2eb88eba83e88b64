//! Lag-backoff coordinator
//!
//! Process-wide backpressure shared by every upload worker. One worker's
//! maxlag response pauses the whole pool: the signalling worker sleeps the
//! clamped backoff itself, and each other worker pays the cooldown once
//! before its next write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Tunable bounds for the shared backoff behavior.
#[derive(Debug, Clone)]
pub struct LagSettings {
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub cooldown: Duration,
}

impl Default for LagSettings {
    fn default() -> Self {
        Self {
            min_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            cooldown: Duration::from_secs(90),
        }
    }
}

/// Shared pause flag with weak consistency: several workers may observe the
/// flag at once and each pay the cooldown before clearing it. The goal is
/// throttling, not precise single-payment semantics.
pub struct LagCoordinator {
    paused: AtomicBool,
    settings: LagSettings,
}

impl LagCoordinator {
    pub fn new(settings: LagSettings) -> Self {
        Self {
            paused: AtomicBool::new(false),
            settings,
        }
    }

    /// Twice the reported lag, clamped to the configured bounds.
    pub fn backoff_duration(&self, lag_seconds: f64) -> Duration {
        let wait = (lag_seconds * 2.0)
            .max(self.settings.min_backoff.as_secs_f64())
            .min(self.settings.max_backoff.as_secs_f64());
        Duration::from_secs_f64(wait)
    }

    /// Report server lag: pause the pool and sleep the calling worker for
    /// the clamped backoff. The sleep is the signalling record's own retry
    /// delay.
    pub async fn signal(&self, lag_seconds: f64) {
        let wait = self.backoff_duration(lag_seconds);
        self.paused.store(true, Ordering::SeqCst);
        tracing::warn!(
            lag_seconds,
            wait_secs = wait.as_secs_f64(),
            "server lag reported, pausing pool"
        );
        tokio::time::sleep(wait).await;
    }

    /// Called by every worker before a write attempt. A set flag costs this
    /// worker one cooldown, then the flag is cleared.
    pub async fn observe_and_clear(&self) {
        if self.paused.load(Ordering::SeqCst) {
            tracing::info!(
                cooldown_secs = self.settings.cooldown.as_secs_f64(),
                "lag pause active, cooling down before next write"
            );
            tokio::time::sleep(self.settings.cooldown).await;
            self.paused.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_clamps() {
        let coordinator = LagCoordinator::new(LagSettings::default());
        assert_eq!(coordinator.backoff_duration(10.0), Duration::from_secs(20));
        assert_eq!(coordinator.backoff_duration(1.0), Duration::from_secs(5));
        assert_eq!(coordinator.backoff_duration(100.0), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn signal_sleeps_the_clamped_backoff() {
        let coordinator = LagCoordinator::new(LagSettings::default());
        let before = tokio::time::Instant::now();
        coordinator.signal(10.0).await;
        assert!(before.elapsed() >= Duration::from_secs(20));
        assert!(before.elapsed() < Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn observe_pays_cooldown_once_and_clears() {
        let coordinator = LagCoordinator::new(LagSettings::default());
        coordinator.signal(10.0).await;
        assert!(coordinator.is_paused());

        let before = tokio::time::Instant::now();
        coordinator.observe_and_clear().await;
        assert!(!coordinator.is_paused());
        assert!(before.elapsed() >= Duration::from_secs(90));

        // Flag cleared: the next observation is free.
        let before = tokio::time::Instant::now();
        coordinator.observe_and_clear().await;
        assert!(before.elapsed() < Duration::from_secs(1));
    }
}
