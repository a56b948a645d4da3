use tokio::time::Instant;

/// Granule ticks per millisecond (48 kHz).
pub const TICKS_PER_MS: f64 = 48.0;

/// Session-relative time. Every timestamp the session hands out, in
/// milliseconds or granule ticks, is measured from process start.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since start, with sub-millisecond precision.
    pub fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn now_granule(&self) -> u64 {
        granule_at(self.now_ms())
    }
}

/// Granule position of a session time in milliseconds.
pub fn granule_at(ms: f64) -> u64 {
    (ms * TICKS_PER_MS).round().max(0.0) as u64
}
