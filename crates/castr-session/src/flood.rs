use std::collections::VecDeque;

/// Rolling byte budget over a window of granule positions.
///
/// Samples are keyed by the (clamped) granule position they arrived at, so
/// the window is measured in the sender's own timeline.
#[derive(Debug, Clone)]
pub struct FloodGuard {
    samples: VecDeque<(u64, u64)>,
    total: u64,
    window: u64,
    budget: u64,
}

impl FloodGuard {
    pub fn new(window: u64, budget: u64) -> Self {
        Self {
            samples: VecDeque::new(),
            total: 0,
            window,
            budget,
        }
    }

    /// Record `len` bytes at `granule_pos`. Returns `true` once the bytes
    /// inside the window exceed the budget.
    pub fn record(&mut self, granule_pos: u64, len: u64) -> bool {
        self.samples.push_back((granule_pos, len));
        self.total += len;

        let earliest = granule_pos.saturating_sub(self.window);
        while let Some(&(pos, len)) = self.samples.front() {
            if pos >= earliest {
                break;
            }
            self.total -= len;
            self.samples.pop_front();
        }

        self.total > self.budget
    }

    /// Bytes currently inside the window.
    pub fn total(&self) -> u64 {
        self.total
    }
}
