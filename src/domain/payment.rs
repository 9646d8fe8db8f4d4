use crate::repo::payments_repo::StoredPayment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Processing,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> PaymentStatus {
        match s {
            "processing" => PaymentStatus::Processing,
            "succeeded" => PaymentStatus::Succeeded,
            _ => PaymentStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Minor units: charging $10.00 means `amount_fractional = 1000`.
    pub amount_fractional: i64,
    pub currency_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInfo {
    pub card_name: String,
    pub card_number: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    /// Accepted on submission only; never persisted, never serialized back out.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cvv: String,
}

/// A charge request from a merchant. `id` is client-supplied and doubles as
/// the idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    /// Replaced by the authenticated principal; the body value is never trusted.
    #[serde(default)]
    pub merchant_id: Uuid,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failed_reason: String,
    pub amount: Amount,
    #[serde(default)]
    pub description: String,
    pub card_info: CardInfo,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn to_stored(&self) -> StoredPayment {
        StoredPayment {
            id: self.id,
            merchant_id: self.merchant_id,
            amount: self.amount.amount_fractional,
            currency_code: self.amount.currency_code.clone(),
            payment_status: self.payment_status.as_str().to_string(),
            failed_reason: (!self.failed_reason.is_empty()).then(|| self.failed_reason.clone()),
            description: self.description.clone(),
            card_name: self.card_info.card_name.clone(),
            card_number: self.card_info.card_number.clone(),
            card_expiry_month: self.card_info.expiry_month,
            card_expiry_year: self.card_info.expiry_year,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn from_stored(stored: StoredPayment) -> Payment {
        Payment {
            id: stored.id,
            merchant_id: stored.merchant_id,
            payment_status: PaymentStatus::parse(&stored.payment_status),
            failed_reason: stored.failed_reason.unwrap_or_default(),
            amount: Amount {
                amount_fractional: stored.amount,
                currency_code: stored.currency_code,
            },
            description: stored.description,
            card_info: CardInfo {
                card_name: stored.card_name,
                card_number: stored.card_number,
                expiry_month: stored.card_expiry_month,
                expiry_year: stored.card_expiry_year,
                cvv: String::new(),
            },
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}
