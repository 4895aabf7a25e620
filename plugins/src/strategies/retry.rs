use std::time::Duration;

use phasegate_core::config::RetryConfig;
use phasegate_core::executor::RetryStrategyPlugin;

/// Errors no amount of retrying fixes.
fn is_spawn_failure(error: &str) -> bool {
    error.contains("agent spawn failed")
}

pub struct ExponentialBackoffPlugin {
    config: RetryConfig,
}

pub struct LinearRetryPlugin {
    config: RetryConfig,
}

impl ExponentialBackoffPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl LinearRetryPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl RetryStrategyPlugin for ExponentialBackoffPlugin {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        let exp = 1u64 << attempt.saturating_sub(1).min(30);
        let delay = self.config.base_delay_ms.saturating_mul(exp);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn is_fatal_error(&self, error: &str) -> bool {
        is_spawn_failure(error)
    }
}

impl RetryStrategyPlugin for LinearRetryPlugin {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        let multiplier = attempt.max(1) as u64;
        let delay = self.config.base_delay_ms.saturating_mul(multiplier);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn is_fatal_error(&self, error: &str) -> bool {
        is_spawn_failure(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let cfg = RetryConfig {
            base_delay_ms: 100,
            max_delay_ms: 1000,
            strategy: "exponential-backoff".to_string(),
        };
        let plugin = ExponentialBackoffPlugin::new(cfg);
        assert_eq!(plugin.next_delay(1, "err").unwrap().as_millis(), 100);
        assert_eq!(plugin.next_delay(2, "err").unwrap().as_millis(), 200);
        assert_eq!(plugin.next_delay(8, "err").unwrap().as_millis(), 1000);
    }

    #[test]
    fn test_linear_backoff() {
        let cfg = RetryConfig {
            base_delay_ms: 50,
            max_delay_ms: 200,
            strategy: "linear".to_string(),
        };
        let plugin = LinearRetryPlugin::new(cfg);
        assert_eq!(plugin.next_delay(1, "err").unwrap().as_millis(), 50);
        assert_eq!(plugin.next_delay(3, "err").unwrap().as_millis(), 150);
        assert_eq!(plugin.next_delay(9, "err").unwrap().as_millis(), 200);
    }

    #[test]
    fn spawn_failures_are_fatal() {
        let plugin = LinearRetryPlugin::new(RetryConfig::default());
        assert!(plugin.is_fatal_error("agent failed for task 'TASK1': agent spawn failed: claude: not found"));
        assert!(!plugin.is_fatal_error("agent exited with Some(1): boom"));
    }
}
