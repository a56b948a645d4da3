use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::RetryConfig;
use crate::error::AccountingError;

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based): the base delay doubled
    /// per attempt, capped at the maximum.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let multiplier = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        let delay = Duration::from_millis(self.base_delay_ms).saturating_mul(multiplier);
        delay.min(Duration::from_millis(self.max_delay_ms))
    }
}

/// Run `op` until it succeeds or the attempts run out.
///
/// Returns `None` after the last failure; the failure is logged, never
/// propagated.
pub async fn with_retry<T, F, Fut>(policy: &RetryConfig, what: &'static str, mut op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AccountingError>>,
{
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Some(value),
            Err(err) if attempt < attempts => {
                let delay = policy.backoff_for_attempt(attempt);
                warn!(operation = what, attempt, error = %err, ?delay, "accounting call failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                error!(operation = what, attempts, error = %err, "accounting call failed, giving up");
            }
        }
    }
    None
}
