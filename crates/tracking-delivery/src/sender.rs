//! Retry tier: JSON POST with exponential backoff and jitter.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracking_core::DeliveryConfig;

use crate::{SendFailure, Transport};

/// Retry schedule for the POST tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay_ms: u64,
    /// Upper bound of the uniform jitter added to every delay.
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DeliveryConfig::default())
    }
}

impl From<&DeliveryConfig> for RetryPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.retry_base_delay_ms,
            max_jitter_ms: config.max_jitter_ms,
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay after failed attempt `attempt` (0-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Full delay: base plus uniform jitter in `[0, max_jitter_ms]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.max_jitter_ms)
        };
        self.base_delay(attempt) + Duration::from_millis(jitter)
    }
}

/// Result of one pass through the retry tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered { attempts: u32 },
    /// 4xx response; not retried
    Rejected { status: u16, attempts: u32 },
    /// Every attempt failed transiently
    Exhausted { attempts: u32, last_error: String },
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }
}

/// Sends payloads through a [`Transport`] with retry.
#[derive(Clone)]
pub struct EventSender {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl EventSender {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// POST `payload` until it succeeds, is rejected, or attempts run out.
    pub async fn send(&self, endpoint: &str, payload: &str) -> SendOutcome {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(endpoint = %endpoint, attempt, "Sending event");

            let failure = match self.transport.post_json(endpoint, payload).await {
                Ok(()) => {
                    info!(endpoint = %endpoint, attempt, "Event delivered");
                    return SendOutcome::Delivered { attempts: attempt };
                }
                Err(failure) => failure,
            };

            if let SendFailure::Status(status) = failure {
                if failure.is_terminal() {
                    warn!(endpoint = %endpoint, status, "Event rejected by endpoint");
                    return SendOutcome::Rejected {
                        status,
                        attempts: attempt,
                    };
                }
            }

            if attempt >= self.policy.max_attempts {
                error!(
                    endpoint = %endpoint,
                    attempt,
                    error = %failure,
                    "Max attempts exceeded"
                );
                return SendOutcome::Exhausted {
                    attempts: attempt,
                    last_error: failure.to_string(),
                };
            }

            let delay = self.policy.delay(attempt - 1);
            warn!(
                endpoint = %endpoint,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Send failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Transport replaying scripted POST results and recording call times.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<(), SendFailure>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<(), SendFailure>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn beacon(&self, _endpoint: &str, _payload: &str) -> bool {
            false
        }

        async fn post_json(&self, _endpoint: &str, _payload: &str) -> Result<(), SendFailure> {
            self.calls.lock().push(Instant::now());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or(Err(SendFailure::Status(500)))
        }
    }

    const ENDPOINT: &str = "https://collect.test/events";

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.base_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.base_delay(2), Duration::from_millis(4000));

        for attempt in 0..3 {
            let delay = policy.delay(attempt);
            assert!(delay >= policy.base_delay(attempt));
            assert!(delay <= policy.base_delay(attempt) + Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Err(SendFailure::Status(400))]);
        let sender = EventSender::new(transport.clone(), RetryPolicy::default());

        let outcome = sender.send(ENDPOINT, "{}").await;
        assert_eq!(outcome, SendOutcome::Rejected { status: 400, attempts: 1 });
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_retries_with_backoff() {
        let transport = ScriptedTransport::new(vec![]);
        let sender = EventSender::new(transport.clone(), RetryPolicy::default());

        let outcome = sender.send(ENDPOINT, "{}").await;
        assert_eq!(
            outcome,
            SendOutcome::Exhausted {
                attempts: 3,
                last_error: "HTTP 500".into()
            }
        );

        let calls = transport.calls.lock().clone();
        assert_eq!(calls.len(), 3);
        let policy = sender.policy();
        for (i, pair) in calls.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            assert!(gap >= policy.base_delay(i as u32));
            assert!(gap <= policy.base_delay(i as u32) + Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_then_success() {
        let transport = ScriptedTransport::new(vec![
            Err(SendFailure::Network("connection reset".into())),
            Ok(()),
        ]);
        let sender = EventSender::new(transport.clone(), RetryPolicy::default());

        let outcome = sender.send(ENDPOINT, "{}").await;
        assert_eq!(outcome, SendOutcome::Delivered { attempts: 2 });
    }
}
