use crate::provider::types::TranscribeError;
use std::time::Duration;
use tokio::time::sleep;

pub struct RetryPolicy {
    max_attempts: u8,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u8) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_secs(1),
        }
    }

    /// `attempt` is the zero-based index of the attempt that just failed.
    pub fn should_retry(&self, attempt: u8, error: &TranscribeError) -> bool {
        if attempt + 1 >= self.max_attempts {
            return false;
        }

        error.is_retryable()
    }

    /// Delay before retrying after the zero-based `attempt` failed:
    /// 2s after the first failure, 4s after the second, doubling onward.
    pub fn delay_for(&self, attempt: u8) -> Duration {
        let multiplier = 2u64.saturating_pow(attempt as u32 + 1);
        let delay_secs = self.base_delay.as_secs().saturating_mul(multiplier);
        Duration::from_secs(delay_secs.max(1))
    }

    pub async fn wait_before_retry(&self, attempt: u8) {
        let delay = self.delay_for(attempt);

        tracing::info!(
            "Retrying in {}s (attempt {})",
            delay.as_secs(),
            attempt + 2
        );
        sleep(delay).await;
    }
}
