//! Storage ports the use cases depend on.
//! Adapters live in `crate::adapters`.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{FormDefinition, FormStatus, FormSubmission, NewPaymentRecord, PaymentRecord};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt stored data: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Stores a new record and returns it with its assigned id.
    async fn insert(&self, record: &NewPaymentRecord) -> RepositoryResult<PaymentRecord>;

    async fn get_by_id(&self, id: i64) -> RepositoryResult<PaymentRecord>;

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<PaymentRecord>>;

    /// Appends `child_id` to the parent's ordered recurring payment list.
    async fn append_recurring_payment(
        &self,
        parent_id: i64,
        child_id: i64,
    ) -> RepositoryResult<PaymentRecord>;
}

#[async_trait]
pub trait FormRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> RepositoryResult<FormDefinition>;

    async fn set_status(&self, id: Uuid, status: FormStatus) -> RepositoryResult<()>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Inserts or replaces the submission payload.
    async fn save(&self, submission: &FormSubmission) -> RepositoryResult<FormSubmission>;

    async fn get(&self, id: Uuid) -> RepositoryResult<FormSubmission>;
}
