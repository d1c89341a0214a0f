use rand::Rng;

/// Failure streak of the fetch loop, with optional tick-skipping backoff
///
/// Polling cadence never changes; when backoff is enabled the poller simply
/// lets some ticks pass without issuing a request after repeated failures.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    enabled: bool,
    max_skip: u32,
    consecutive_failures: u32,
    skip_remaining: u32,
}

impl PollBackoff {
    pub fn new(enabled: bool, max_skip: u32) -> Self {
        Self {
            enabled,
            max_skip,
            consecutive_failures: 0,
            skip_remaining: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a failed cycle; returns how many upcoming ticks will be skipped
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if !self.enabled || self.max_skip == 0 {
            return 0;
        }

        let exponent = (self.consecutive_failures - 1).min(31);
        let base = 2_u32.saturating_pow(exponent).min(self.max_skip);
        let jitter = if base > 1 {
            rand::thread_rng().gen_range(0..=base / 2)
        } else {
            0
        };
        self.skip_remaining = base.saturating_add(jitter).min(self.max_skip);

        if self.consecutive_failures > 1 {
            log::warn!(
                "⏳ {} consecutive fetch failures, skipping next {} tick(s)",
                self.consecutive_failures,
                self.skip_remaining
            );
        }
        self.skip_remaining
    }

    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            log::info!("✅ Event fetch recovered after {} failure(s)", self.consecutive_failures);
        }
        self.consecutive_failures = 0;
        self.skip_remaining = 0;
    }

    /// Consume one skipped tick, if any are pending
    pub fn should_skip_tick(&mut self) -> bool {
        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.skip_remaining = 0;
    }
}
