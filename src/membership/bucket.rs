use tokio::time::Instant;

/// Continuous-time token bucket gating outbound JOIN/PART commands.
///
/// Callers pass the current instant explicitly, which keeps the bucket a
/// pure state machine and lets tests drive it with constructed clocks.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    pub fn new(
        tokens_per_second: f64,
        burst: u32,
        now: Instant,
    ) -> Self {
        Self {
            rate: tokens_per_second,
            capacity: f64::from(burst),
            tokens: f64::from(burst),
            last_update: now,
        }
    }

    fn refill(
        &mut self,
        now: Instant,
    ) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
            self.last_update = now;
        }
    }

    /// Takes one token if available.
    pub fn take(
        &mut self,
        now: Instant,
    ) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return true;
        }
        false
    }

    /// Returns a token reserved by `take` whose command never made it onto
    /// the outbound stream, so a failed emission does not consume rate.
    pub fn refund(
        &mut self,
        now: Instant,
    ) {
        self.refill(now);
        self.tokens = (self.tokens + 1.0).min(self.capacity);
    }
}
