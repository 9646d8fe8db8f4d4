use crate::domain::payment::PaymentStatus;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record violates a database constraint")]
    IntegrityViolation(#[source] sqlx::Error),
    #[error("payment not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Row shape of the `payments` table. The CVV has no column here.
#[derive(Debug, Clone)]
pub struct StoredPayment {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub amount: i64,
    pub currency_code: String,
    pub payment_status: String,
    pub failed_reason: Option<String>,
    pub description: String,
    pub card_name: String,
    pub card_number: String,
    pub card_expiry_month: i32,
    pub card_expiry_year: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct PaymentsRepo {
    pub pool: PgPool,
}

impl PaymentsRepo {
    /// Inserts inside the caller's transaction so a failed bank submission
    /// can roll the record back.
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment: &StoredPayment,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, merchant_id, amount, currency_code, payment_status,
                failed_reason, description, card_name, card_number,
                card_expiry_month, card_expiry_year
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9,
                $10, $11
            )
            "#,
        )
        .bind(payment.id)
        .bind(payment.merchant_id)
        .bind(payment.amount)
        .bind(payment.currency_code.clone())
        .bind(payment.payment_status.clone())
        .bind(payment.failed_reason.clone())
        .bind(payment.description.clone())
        .bind(payment.card_name.clone())
        .bind(payment.card_number.clone())
        .bind(payment.card_expiry_month)
        .bind(payment.card_expiry_year)
        .execute(tx.as_mut())
        .await
        .map_err(classify)?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<StoredPayment, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT id, merchant_id, amount, currency_code, payment_status,
                   failed_reason, description, card_name, card_number,
                   card_expiry_month, card_expiry_year, created_at, updated_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)?;

        Ok(StoredPayment {
            id: row.get("id"),
            merchant_id: row.get("merchant_id"),
            amount: row.get("amount"),
            currency_code: row.get("currency_code"),
            payment_status: row.get("payment_status"),
            failed_reason: row.get("failed_reason"),
            description: row.get("description"),
            card_name: row.get("card_name"),
            card_number: row.get("card_number"),
            card_expiry_month: row.get("card_expiry_month"),
            card_expiry_year: row.get("card_expiry_year"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Conditional on the row still being `processing`: terminal records are
    /// untouched, which makes late or duplicate callbacks no-ops. Returns the
    /// number of rows affected.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: &PaymentStatus,
        failed_reason: Option<&str>,
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET payment_status = $2, failed_reason = $3, updated_at = now()
            WHERE id = $1 AND payment_status = 'processing'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(failed_reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn classify(err: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() || db.is_foreign_key_violation() {
            return RepoError::IntegrityViolation(err);
        }
    }
    RepoError::Database(err)
}
