use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Largest exponent applied to the jitter; later waits are clamped by the
/// poll ceiling long before this matters.
const MAX_EXPONENT: u32 = 20;

/// Growing, jittered delay between managed-run status polls.
///
/// The first delay is `U₀`; after the n-th RUNNING observation the next delay
/// is the previous one plus `2^n · Uₙ`, with every `U` drawn uniformly from
/// `[0, base)`.
#[derive(Debug)]
pub struct PollBackoff<R = StdRng> {
    base: Duration,
    running_observations: u32,
    current: Duration,
    rng: R,
}

impl PollBackoff<StdRng> {
    pub fn new(base: Duration) -> Self {
        Self::with_rng(base, StdRng::from_os_rng())
    }
}

impl<R: Rng> PollBackoff<R> {
    pub fn with_rng(base: Duration, rng: R) -> Self {
        Self {
            base,
            running_observations: 0,
            current: Duration::ZERO,
            rng,
        }
    }

    pub fn running_observations(&self) -> u32 {
        self.running_observations
    }

    pub fn record_running(&mut self) {
        self.running_observations = self.running_observations.saturating_add(1);
    }

    pub fn next_delay(&mut self) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let jitter_ms = if base_ms == 0 {
            0
        } else {
            self.rng.random_range(0..base_ms)
        };
        let factor = 1u64 << self.running_observations.min(MAX_EXPONENT);
        let step = Duration::from_millis(jitter_ms.saturating_mul(factor));
        self.current = self.current.saturating_add(step);
        self.current
    }
}
