use async_trait::async_trait;
use payment_gateway::bank::{AcquiringBank, BankResponse, BankResultHook};
use payment_gateway::domain::payment::{Amount, CardInfo, Payment, PaymentStatus};
use payment_gateway::resilience::breaker::{BreakerSettings, CircuitBreaker, CircuitState};
use payment_gateway::resilience::{BankError, ResilientBank, RetrySettings};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Replies with a scripted sequence of sync status codes and never settles.
struct ScriptedBank {
    statuses: Mutex<VecDeque<u16>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedBank {
    fn new(statuses: &[u16]) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquiringBank for ScriptedBank {
    async fn submit(
        &self,
        _payment: &Payment,
        _on_result: BankResultHook,
    ) -> anyhow::Result<BankResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let status = self.statuses.lock().unwrap().pop_front().unwrap_or(202);
        Ok(BankResponse {
            status_code: status,
        })
    }
}

fn test_payment() -> Payment {
    Payment {
        id: Uuid::new_v4(),
        merchant_id: Uuid::new_v4(),
        payment_status: PaymentStatus::Processing,
        failed_reason: String::new(),
        amount: Amount {
            amount_fractional: 2000,
            currency_code: "USD".to_string(),
        },
        description: "Payment test".to_string(),
        card_info: CardInfo {
            card_name: "Mario Arizaj".to_string(),
            card_number: "378282246310005".to_string(),
            expiry_month: 10,
            expiry_year: 99,
            cvv: "123".to_string(),
        },
        created_at: None,
        updated_at: None,
    }
}

fn noop_hook() -> BankResultHook {
    Arc::new(|_| Box::pin(async {}))
}

fn calm_settings() -> BreakerSettings {
    BreakerSettings {
        timeout: Duration::from_secs(5),
        max_concurrent_requests: 10,
        error_percent_threshold: 50,
        request_volume_threshold: 20,
        sleep_window: Duration::from_secs(5),
    }
}

fn wrap(inner: Arc<ScriptedBank>, settings: BreakerSettings) -> ResilientBank {
    ResilientBank {
        inner,
        breaker: Arc::new(CircuitBreaker::new("acquiring_bank", settings)),
        retry: RetrySettings {
            max_attempts: 3,
            backoff: Duration::from_millis(10),
        },
    }
}

#[tokio::test]
async fn recovers_after_transient_server_errors() {
    let bank = ScriptedBank::new(&[500, 500, 202]);
    let resilient = wrap(bank.clone(), calm_settings());

    let response = resilient
        .submit(&test_payment(), noop_hook())
        .await
        .expect("third attempt should succeed");
    assert_eq!(response.status_code, 202);
    assert_eq!(bank.calls(), 3);
}

#[tokio::test]
async fn exhausts_retries_on_persistent_server_errors() {
    let bank = ScriptedBank::new(&[500, 500, 500]);
    let resilient = wrap(bank.clone(), calm_settings());

    let err = resilient
        .submit(&test_payment(), noop_hook())
        .await
        .expect_err("all attempts fail");
    assert!(matches!(err, BankError::ServerError(500)));
    assert_eq!(bank.calls(), 3);
}

#[tokio::test]
async fn client_rejection_short_circuits() {
    let bank = ScriptedBank::new(&[400]);
    let resilient = wrap(bank.clone(), calm_settings());

    let err = resilient
        .submit(&test_payment(), noop_hook())
        .await
        .expect_err("client errors are not retried");
    assert!(matches!(err, BankError::Rejected(400)));
    assert_eq!(
        err.to_string(),
        "payment failed to get created on acquiring bank, status: 400"
    );
    assert_eq!(bank.calls(), 1);
}

#[tokio::test]
async fn open_circuit_rejects_without_calling_the_bank() {
    let bank = ScriptedBank::new(&[500, 500, 500]);
    let resilient = wrap(
        bank.clone(),
        BreakerSettings {
            request_volume_threshold: 1,
            ..calm_settings()
        },
    );

    let err = resilient
        .submit(&test_payment(), noop_hook())
        .await
        .expect_err("exhausted retries");
    assert!(matches!(err, BankError::ServerError(500)));
    assert_eq!(resilient.breaker.state(), CircuitState::Open);

    let err = resilient
        .submit(&test_payment(), noop_hook())
        .await
        .expect_err("circuit is open");
    assert!(matches!(err, BankError::CircuitOpen));
    assert_eq!(err.to_string(), "circuit open");
    assert_eq!(bank.calls(), 3);
}

#[tokio::test]
async fn timeout_envelope_trips_the_breaker() {
    let bank = Arc::new(ScriptedBank {
        statuses: Mutex::new(VecDeque::from([202])),
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(200),
    });
    let resilient = wrap(
        bank.clone(),
        BreakerSettings {
            timeout: Duration::from_millis(50),
            request_volume_threshold: 1,
            ..calm_settings()
        },
    );

    let err = resilient
        .submit(&test_payment(), noop_hook())
        .await
        .expect_err("bank is slower than the budget");
    assert!(matches!(err, BankError::Timeout));
    assert_eq!(resilient.breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn half_open_probe_closes_the_circuit() {
    let bank = ScriptedBank::new(&[400, 202]);
    let resilient = wrap(
        bank.clone(),
        BreakerSettings {
            request_volume_threshold: 1,
            sleep_window: Duration::from_millis(30),
            ..calm_settings()
        },
    );

    let err = resilient
        .submit(&test_payment(), noop_hook())
        .await
        .expect_err("rejected by the bank");
    assert!(matches!(err, BankError::Rejected(400)));
    assert_eq!(resilient.breaker.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(40)).await;

    let response = resilient
        .submit(&test_payment(), noop_hook())
        .await
        .expect("probe succeeds");
    assert_eq!(response.status_code, 202);
    assert_eq!(resilient.breaker.state(), CircuitState::Closed);
    assert_eq!(bank.calls(), 2);
}
