use std::time::Duration;

/// Delay policy between attempts of one task pipeline.
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;
    /// Delay before the attempt following `attempt` (1-based); `None` means retry immediately.
    fn next_delay(&self, attempt: u32, error: &str) -> Option<Duration>;
    fn is_fatal_error(&self, _error: &str) -> bool {
        false
    }
}
