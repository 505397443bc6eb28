//! Per-step call throttling, shared by all rayon workers of that step.

use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Spaces external calls at least `delay` apart across every worker of a
/// step. A zero delay disables throttling.
///
/// Backed by a [`governor`] direct limiter with a burst of one, so idle
/// periods never bank extra permits.
pub struct RateGate {
    delay: Duration,
    limiter: Option<DefaultDirectRateLimiter>,
    clock: DefaultClock,
}

impl RateGate {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            limiter: Quota::with_period(delay).map(RateLimiter::direct),
            clock: DefaultClock::default(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Block the calling worker until the limiter grants a permit.
    pub fn wait(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        while let Err(not_until) = limiter.check() {
            std::thread::sleep(not_until.wait_time_from(self.clock.now()));
        }
    }

    /// Take a permit if one is available right now.
    fn try_acquire(&self) -> bool {
        self.limiter.as_ref().is_none_or(|l| l.check().is_ok())
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate").field("delay", &self.delay).finish()
    }
}
