//! Retry policy (spec §4.12): a pure transient-error classifier plus a
//! bounded-attempt backoff scheduler.

use std::time::Duration;

use rand::Rng;

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub kind: BackoffKind,
    pub base: Duration,
    pub max_delay: Duration,
    pub jitter_min: f64,
    pub jitter_max: f64,
    /// Server error codes treated as transient in addition to connection-
    /// level errors (e.g. gateway-overload codes).
    pub transient_codes: Vec<i64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            kind: BackoffKind::Exponential,
            base: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter_min: 0.8,
            jitter_max: 1.2,
            transient_codes: vec![-32000, 429, 503],
        }
    }
}

impl RetryPolicy {
    /// Pure classifier: true if the retry scheduler is allowed to retry
    /// this error (spec §4.12).
    pub fn is_transient(&self, error: &ProviderError) -> bool {
        if error.is_transient() {
            return true;
        }
        matches!(error, ProviderError::RpcError { code, .. } if self.transient_codes.contains(code))
    }

    fn delay_for(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let raw = match self.kind {
            BackoffKind::Linear => self.base.saturating_mul(attempt + 1),
            BackoffKind::Exponential => {
                self.base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            }
        };
        let capped = raw.min(self.max_delay);
        let jitter = rng.gen_range(self.jitter_min..=self.jitter_max);
        capped.mul_f64(jitter)
    }

    /// Runs `op` up to `max_attempts` times, sleeping the caller's task
    /// between attempts using the configured backoff. Stops early on a
    /// non-transient error.
    pub async fn retry<F, Fut, T>(&self, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let mut rng = rand::thread_rng();
        let mut last_error = None;
        for attempt in 0..self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !self.is_transient(&error) {
                        return Err(error);
                    }
                    last_error = Some(error);
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(self.delay_for(attempt, &mut rng)).await;
                    }
                }
            }
        }
        Err(last_error.expect("loop runs at least once since max_attempts >= 1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn connection_lost_is_transient() {
        let policy = RetryPolicy::default();
        assert!(policy.is_transient(&ProviderError::ConnectionLost));
    }

    #[test]
    fn protocol_error_is_not_transient() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_transient(&ProviderError::ProtocolError("bad".to_string())));
    }

    #[test]
    fn configured_rpc_code_is_transient() {
        let policy = RetryPolicy::default();
        let error = ProviderError::RpcError {
            code: 429,
            message: "rate limited".to_string(),
            data: None,
        };
        assert!(policy.is_transient(&error));
    }

    #[tokio::test]
    async fn retry_stops_immediately_on_non_transient_error() {
        let policy = RetryPolicy {
            max_attempts: 5,
            ..RetryPolicy::default()
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<(), ProviderError> = policy
            .retry(move || {
                attempts_clone.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::ProtocolError("nope".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_exhausts_max_attempts_on_persistent_transient_error() {
        tokio::time::pause();
        let policy = RetryPolicy {
            max_attempts: 3,
            base: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryPolicy::default()
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<(), ProviderError> = policy
            .retry(move || {
                attempts_clone.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::ConnectionLost) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
