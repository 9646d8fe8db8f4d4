use crate::bank::BankResultHook;
use crate::cache::{CacheError, ResultCache};
use crate::creditcard;
use crate::domain::error::PaymentError;
use crate::domain::payment::{Payment, PaymentStatus};
use crate::repo::payments_repo::{PaymentsRepo, RepoError};
use crate::resilience::{BankError, ResilientBank};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const DEDUPLICATION_CACHE_KEY: &str = "deduplication";
const PAYMENT_CACHE_KEY: &str = "payment";

/// Repeats of the same (pan, amount, currency) are rejected inside this window.
const DEDUPLICATION_TTL: Duration = Duration::from_secs(5 * 60);
const SNAPSHOT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Orchestrates a charge across the card validator, the deduplication cache,
/// the payments table and the acquiring bank. Holds no mutable state of its
/// own; all synchronisation lives in Postgres and Redis.
#[derive(Clone)]
pub struct PaymentService {
    pub pool: PgPool,
    pub payments_repo: PaymentsRepo,
    pub cache: ResultCache,
    pub bank: Arc<ResilientBank>,
}

impl PaymentService {
    pub async fn create_payment(&self, mut payment: Payment) -> Result<Payment, PaymentError> {
        creditcard::validate(&payment.card_info)
            .map_err(|err| PaymentError::BadRequest(err.to_string()))?;

        let dedup_key = Self::dedup_key(&payment);
        match self.cache.get_value::<bool>(&dedup_key).await {
            Ok(true) => {
                tracing::warn!(
                    payment_id = %payment.id,
                    "duplicate payment attempt within the deduplication window"
                );
                return Err(PaymentError::Conflict);
            }
            Ok(false) | Err(CacheError::Miss) => {}
            Err(err) => return Err(PaymentError::Internal(err.into())),
        }

        payment.payment_status = PaymentStatus::Processing;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| PaymentError::Internal(err.into()))?;
        match PaymentsRepo::insert_tx(&mut tx, &payment.to_stored()).await {
            Ok(()) => {}
            Err(RepoError::IntegrityViolation(err)) => {
                tracing::warn!(payment_id = %payment.id, error = %err, "duplicate id or unknown merchant");
                return Err(PaymentError::Conflict);
            }
            Err(err) => return Err(PaymentError::Internal(err.into())),
        }

        if let Err(err) = self.bank.submit(&payment, self.bank_result_hook()).await {
            // Dropping the open transaction rolls the local record back.
            drop(tx);
            return Err(match &err {
                BankError::Rejected(_) => PaymentError::BadRequest(err.to_string()),
                _ => PaymentError::Internal(err.into()),
            });
        }

        tx.commit()
            .await
            .map_err(|err| PaymentError::Internal(err.into()))?;

        // The marker is written only after commit; failing here is fatal to
        // the request even though the payment now exists. A retry with the
        // same id surfaces as a conflict on the primary key.
        self.cache
            .set_value(&dedup_key, &true, DEDUPLICATION_TTL)
            .await
            .map_err(|err| PaymentError::Internal(err.into()))?;

        let stored = self
            .payments_repo
            .get_by_id(payment.id)
            .await
            .map_err(|err| PaymentError::Internal(err.into()))?;
        Ok(Payment::from_stored(stored))
    }

    pub async fn get_payment(&self, id: Uuid) -> Result<Payment, PaymentError> {
        let key = Self::snapshot_key(id);
        match self.cache.get_value::<Payment>(&key).await {
            Ok(payment) => return Ok(payment),
            Err(CacheError::Miss) => {}
            Err(err) => {
                tracing::error!(payment_id = %id, error = %err, "payment snapshot read failed");
            }
        }

        let stored = match self.payments_repo.get_by_id(id).await {
            Ok(stored) => stored,
            Err(RepoError::NotFound) => {
                tracing::info!(payment_id = %id, "payment not found");
                return Err(PaymentError::NotFound);
            }
            Err(err) => return Err(PaymentError::Internal(err.into())),
        };

        let payment = Payment::from_stored(stored);
        if let Err(err) = self.cache.set_value(&key, &payment, SNAPSHOT_TTL).await {
            tracing::error!(payment_id = %id, error = %err, "payment snapshot write failed");
        }
        Ok(payment)
    }

    /// Applies an asynchronous bank result. The snapshot cache is invalidated
    /// before the row is updated so a concurrent read cannot re-serve the
    /// stale `processing` state. Failures are logged only; there is no caller
    /// to surface them to.
    pub async fn handle_bank_result(&self, payment: Payment) {
        if let Err(err) = self.cache.delete(&Self::snapshot_key(payment.id)).await {
            tracing::error!(
                payment_id = %payment.id,
                error = %err,
                "failed to invalidate payment snapshot"
            );
        }

        let failed_reason =
            (!payment.failed_reason.is_empty()).then_some(payment.failed_reason.as_str());
        match self
            .payments_repo
            .update_status(payment.id, &payment.payment_status, failed_reason)
            .await
        {
            Ok(0) => {
                tracing::info!(payment_id = %payment.id, "bank result for a settled payment, ignoring")
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(payment_id = %payment.id, error = %err, "failed to apply bank result")
            }
        }
    }

    pub fn bank_result_hook(&self) -> BankResultHook {
        let service = self.clone();
        Arc::new(move |payment: Payment| {
            let service = service.clone();
            Box::pin(async move { service.handle_bank_result(payment).await })
        })
    }

    pub fn dedup_key(payment: &Payment) -> String {
        format!(
            "{}_{}_{}_{}",
            DEDUPLICATION_CACHE_KEY,
            payment.card_info.card_number,
            payment.amount.amount_fractional,
            payment.amount.currency_code
        )
    }

    pub fn snapshot_key(id: Uuid) -> String {
        format!("{PAYMENT_CACHE_KEY}_{id}")
    }
}
