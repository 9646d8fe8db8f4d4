use crate::bank::{AcquiringBank, BankResponse, BankResultHook};
use crate::domain::payment::Payment;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod breaker;

use breaker::{BreakerError, CircuitBreaker};

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Any of these means the payment was not submitted to the bank.
#[derive(Debug, Error)]
pub enum BankError {
    #[error("circuit open")]
    CircuitOpen,
    #[error("bank call exceeded the configured concurrency limit")]
    AtCapacity,
    #[error("bank call timed out")]
    Timeout,
    #[error("payment failed to get created on acquiring bank, status: {0}")]
    Rejected(u16),
    #[error("acquiring bank kept failing, last status: {0}")]
    ServerError(u16),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Circuit breaker and bounded retries around an acquiring bank. The whole
/// retry sequence runs under the breaker's timeout; a rejected or timed-out
/// sequence counts as a single breaker failure.
pub struct ResilientBank {
    pub inner: Arc<dyn AcquiringBank>,
    pub breaker: Arc<CircuitBreaker>,
    pub retry: RetrySettings,
}

impl ResilientBank {
    pub async fn submit(
        &self,
        payment: &Payment,
        on_result: BankResultHook,
    ) -> Result<BankResponse, BankError> {
        let token = match self.breaker.try_acquire() {
            Ok(token) => token,
            Err(BreakerError::Open) => return Err(BankError::CircuitOpen),
            Err(BreakerError::AtCapacity) => return Err(BankError::AtCapacity),
        };

        let budget = self.breaker.settings().timeout;
        match tokio::time::timeout(budget, self.submit_with_retries(payment, on_result)).await {
            Ok(Ok(response)) => {
                token.complete(true);
                Ok(response)
            }
            Ok(Err(err)) => {
                token.complete(false);
                Err(err)
            }
            Err(_elapsed) => {
                token.complete(false);
                Err(BankError::Timeout)
            }
        }
    }

    async fn submit_with_retries(
        &self,
        payment: &Payment,
        on_result: BankResultHook,
    ) -> Result<BankResponse, BankError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.inner.submit(payment, on_result.clone()).await {
                Ok(response) if response.status_code < 300 => return Ok(response),
                // Client-side rejections are not retried.
                Ok(response) if response.status_code < 500 => {
                    return Err(BankError::Rejected(response.status_code));
                }
                Ok(response) => BankError::ServerError(response.status_code),
                Err(err) => BankError::Transport(err),
            };

            if attempt >= attempts {
                return Err(err);
            }
            tracing::warn!(
                attempt,
                error = %err,
                "acquiring bank submission failed, retrying"
            );
            tokio::time::sleep(self.retry.backoff).await;
        }
    }
}
