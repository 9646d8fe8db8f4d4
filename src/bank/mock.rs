use crate::bank::{AcquiringBank, BankResponse, BankResultHook};
use crate::config::MockBankConfig;
use crate::domain::payment::{Payment, PaymentStatus};
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Stand-in acquiring bank: replies with a configured status after a short
/// delay and, when enabled, settles the payment asynchronously through the
/// caller's result hook.
pub struct MockBank {
    pub status_code: u16,
    pub callback_status: PaymentStatus,
    pub failed_reason: Option<String>,
    pub sync_delay: Duration,
    pub callback_delay: Duration,
    pub run_callback: bool,
    submissions: AtomicUsize,
}

impl MockBank {
    pub fn new(cfg: &MockBankConfig) -> Self {
        Self {
            status_code: cfg.status_code,
            callback_status: PaymentStatus::parse(&cfg.update_to_status),
            failed_reason: cfg.failed_reason.clone(),
            sync_delay: Duration::from_millis(cfg.sleep_interval_initial_request_ms),
            callback_delay: Duration::from_millis(cfg.sleep_interval_for_callback_ms),
            run_callback: cfg.should_run_callback,
            submissions: AtomicUsize::new(0),
        }
    }

    /// Total number of `submit` calls seen, including retries.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AcquiringBank for MockBank {
    async fn submit(&self, payment: &Payment, on_result: BankResultHook) -> Result<BankResponse> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.sync_delay).await;

        if self.run_callback {
            let mut settled = payment.clone();
            settled.payment_status = self.callback_status;
            if let Some(reason) = &self.failed_reason {
                settled.failed_reason = reason.clone();
            }
            let delay = self.callback_delay;
            // The callback outlives the originating request.
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                on_result(settled).await;
            });
        }

        Ok(BankResponse {
            status_code: self.status_code,
        })
    }
}
