//! Payment record domain entity.
//! Framework-agnostic representation of one attempted or completed transaction.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Currency used for every donation.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Domain entity representing a persisted payment record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub code: String,
    pub created_time: DateTime<Utc>,
    pub changed_time: DateTime<Utc>,
    pub submitted_time: Option<DateTime<Utc>>,
    pub payment_id: Option<String>,
    pub card_token: Option<String>,
    pub payment_instrument_id: Option<String>,
    pub authorized_amount: BigDecimal,
    pub currency: String,
    pub transaction_id: Option<String>,
    pub status: String,
    pub recurring: bool,
    pub environment: String,
    pub submission_ref: Option<Uuid>,
    pub recurring_payments: Vec<i64>,
}

impl PaymentRecord {
    pub fn is_recurring(&self) -> bool {
        self.recurring
    }
}

/// A payment record that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentRecord {
    pub uuid: Uuid,
    pub code: String,
    pub created_time: DateTime<Utc>,
    pub changed_time: DateTime<Utc>,
    pub submitted_time: Option<DateTime<Utc>>,
    pub payment_id: Option<String>,
    pub card_token: Option<String>,
    pub payment_instrument_id: Option<String>,
    pub authorized_amount: BigDecimal,
    pub currency: String,
    pub transaction_id: Option<String>,
    pub status: String,
    pub recurring: bool,
    pub environment: String,
    pub submission_ref: Option<Uuid>,
}

impl NewPaymentRecord {
    /// Attaches the storage-assigned identity.
    pub fn into_record(self, id: i64) -> PaymentRecord {
        PaymentRecord {
            id,
            uuid: self.uuid,
            code: self.code,
            created_time: self.created_time,
            changed_time: self.changed_time,
            submitted_time: self.submitted_time,
            payment_id: self.payment_id,
            card_token: self.card_token,
            payment_instrument_id: self.payment_instrument_id,
            authorized_amount: self.authorized_amount,
            currency: self.currency,
            transaction_id: self.transaction_id,
            status: self.status,
            recurring: self.recurring,
            environment: self.environment,
            submission_ref: self.submission_ref,
            recurring_payments: Vec::new(),
        }
    }
}

/// Caller-supplied values for a new payment record.
#[derive(Debug, Clone)]
pub struct PaymentFields {
    pub uuid: Option<Uuid>,
    pub code: String,
    pub submitted_time: Option<DateTime<Utc>>,
    pub payment_id: Option<String>,
    pub card_token: Option<String>,
    pub payment_instrument_id: Option<String>,
    pub authorized_amount: BigDecimal,
    pub currency: String,
    pub transaction_id: Option<String>,
    pub status: String,
    pub recurring: bool,
    pub environment: String,
    pub submission_ref: Option<Uuid>,
}

pub type UuidSource = Arc<dyn Fn() -> Uuid + Send + Sync>;

/// Builds new payment records, assigning the UUID and timestamps.
#[derive(Clone)]
pub struct PaymentRecordFactory {
    uuid_source: UuidSource,
}

impl PaymentRecordFactory {
    pub fn new() -> Self {
        Self {
            uuid_source: Arc::new(Uuid::new_v4),
        }
    }

    pub fn with_uuid_source<F>(source: F) -> Self
    where
        F: Fn() -> Uuid + Send + Sync + 'static,
    {
        Self {
            uuid_source: Arc::new(source),
        }
    }

    pub fn create(&self, fields: PaymentFields) -> NewPaymentRecord {
        let uuid = match fields.uuid {
            Some(uuid) if !uuid.is_nil() => uuid,
            _ => (self.uuid_source)(),
        };
        let now = Utc::now();

        NewPaymentRecord {
            uuid,
            code: fields.code,
            created_time: now,
            changed_time: now,
            submitted_time: fields.submitted_time,
            payment_id: fields.payment_id,
            card_token: fields.card_token,
            payment_instrument_id: fields.payment_instrument_id,
            authorized_amount: fields.authorized_amount.with_scale(2),
            currency: fields.currency,
            transaction_id: fields.transaction_id,
            status: fields.status,
            recurring: fields.recurring,
            environment: fields.environment,
            submission_ref: fields.submission_ref,
        }
    }
}

impl Default for PaymentRecordFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Gateway status vocabulary as far as the submission flow cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Authorized,
    Declined,
    InvalidRequest,
    Other(String),
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Authorized => "AUTHORIZED",
            TransactionStatus::Declined => "DECLINED",
            TransactionStatus::InvalidRequest => "INVALID_REQUEST",
            TransactionStatus::Other(status) => status,
        }
    }
}

impl From<&str> for TransactionStatus {
    fn from(status: &str) -> Self {
        match status {
            "AUTHORIZED" => TransactionStatus::Authorized,
            "DECLINED" => TransactionStatus::Declined,
            "INVALID_REQUEST" => TransactionStatus::InvalidRequest,
            other => TransactionStatus::Other(other.to_string()),
        }
    }
}

/// Merchant reference code: `<prefix>-<1000..=9999>-<1000..=9999>`.
///
/// Codes are not checked for uniqueness.
pub fn generate_reference_code<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    let first: u16 = rng.random_range(1000..=9999);
    let second: u16 = rng.random_range(1000..=9999);
    format!("{}-{}-{}", prefix, first, second)
}

/// Amounts without a decimal point get `.00` appended; anything else is left alone.
pub fn normalize_amount(raw: &str) -> String {
    if raw.contains('.') {
        raw.to_string()
    } else {
        format!("{}.00", raw)
    }
}
