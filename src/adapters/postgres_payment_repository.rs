//! Postgres implementation of PaymentRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewPaymentRecord, PaymentRecord};
use crate::ports::{PaymentRepository, RepositoryError, RepositoryResult};

const SELECT_PAYMENT: &str = r#"
    SELECT p.id, p.uuid, p.code, p.created_time, p.changed_time, p.submitted_time,
        p.payment_id, p.card_token, p.payment_instrument_id, p.authorized_amount,
        p.currency, p.transaction_id, p.status, p.recurring, p.environment, p.submission_ref,
        ARRAY(
            SELECT r.recurring_payment_id FROM payment_recurring_payments r
            WHERE r.payment_id = p.id ORDER BY r.ordinal
        ) AS recurring_payments
    FROM payments p
"#;

/// Postgres-backed payment repository.
#[derive(Clone)]
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn insert(&self, record: &NewPaymentRecord) -> RepositoryResult<PaymentRecord> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO payments (
                uuid, code, created_time, changed_time, submitted_time,
                payment_id, card_token, payment_instrument_id, authorized_amount, currency,
                transaction_id, status, recurring, environment, submission_ref
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            "#,
        )
        .bind(record.uuid)
        .bind(&record.code)
        .bind(record.created_time)
        .bind(record.changed_time)
        .bind(record.submitted_time)
        .bind(&record.payment_id)
        .bind(&record.card_token)
        .bind(&record.payment_instrument_id)
        .bind(&record.authorized_amount)
        .bind(&record.currency)
        .bind(&record.transaction_id)
        .bind(&record.status)
        .bind(record.recurring)
        .bind(&record.environment)
        .bind(record.submission_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(record.clone().into_record(id))
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<PaymentRecord> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!("{} WHERE p.id = $1", SELECT_PAYMENT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(format!("payment {}", id)))
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<PaymentRecord>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "{} ORDER BY p.created_time DESC, p.id DESC LIMIT $1 OFFSET $2",
            SELECT_PAYMENT
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn append_recurring_payment(
        &self,
        parent_id: i64,
        child_id: i64,
    ) -> RepositoryResult<PaymentRecord> {
        let mut tx = self.pool.begin().await?;

        let parent = sqlx::query_scalar::<_, i64>("SELECT id FROM payments WHERE id = $1 FOR UPDATE")
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await?;
        if parent.is_none() {
            return Err(RepositoryError::NotFound(format!("payment {}", parent_id)));
        }

        let child = sqlx::query_scalar::<_, i64>("SELECT id FROM payments WHERE id = $1")
            .bind(child_id)
            .fetch_optional(&mut *tx)
            .await?;
        if child.is_none() {
            return Err(RepositoryError::NotFound(format!("payment {}", child_id)));
        }

        sqlx::query(
            r#"
            INSERT INTO payment_recurring_payments (payment_id, ordinal, recurring_payment_id)
            SELECT $1, COALESCE(MAX(ordinal) + 1, 0), $2
            FROM payment_recurring_payments WHERE payment_id = $1
            "#,
        )
        .bind(parent_id)
        .bind(child_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE payments SET changed_time = NOW() WHERE id = $1")
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_by_id(parent_id).await
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    uuid: Uuid,
    code: String,
    created_time: chrono::DateTime<chrono::Utc>,
    changed_time: chrono::DateTime<chrono::Utc>,
    submitted_time: Option<chrono::DateTime<chrono::Utc>>,
    payment_id: Option<String>,
    card_token: Option<String>,
    payment_instrument_id: Option<String>,
    authorized_amount: bigdecimal::BigDecimal,
    currency: String,
    transaction_id: Option<String>,
    status: String,
    recurring: bool,
    environment: String,
    submission_ref: Option<Uuid>,
    recurring_payments: Vec<i64>,
}

impl PaymentRow {
    fn into_domain(self) -> PaymentRecord {
        PaymentRecord {
            id: self.id,
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
            recurring_payments: self.recurring_payments,
        }
    }
}
