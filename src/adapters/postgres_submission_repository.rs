//! Postgres implementation of SubmissionRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{FormSubmission, SubmissionData};
use crate::ports::{RepositoryError, RepositoryResult, SubmissionRepository};

#[derive(Clone)]
pub struct PostgresSubmissionRepository {
    pool: PgPool,
}

impl PostgresSubmissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionRepository for PostgresSubmissionRepository {
    async fn save(&self, submission: &FormSubmission) -> RepositoryResult<FormSubmission> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            INSERT INTO form_submissions (id, form_id, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at
            RETURNING id, form_id, data, created_at, updated_at
            "#,
        )
        .bind(submission.id)
        .bind(submission.form_id)
        .bind(submission.data.to_value())
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<FormSubmission> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            "SELECT id, form_id, data, created_at, updated_at FROM form_submissions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("submission {}", id)))?
            .into_domain()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct SubmissionRow {
    id: Uuid,
    form_id: Uuid,
    data: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl SubmissionRow {
    fn into_domain(self) -> RepositoryResult<FormSubmission> {
        let data = SubmissionData::from_value(self.data).ok_or_else(|| {
            RepositoryError::Corrupt(format!("submission {} data is not an object", self.id))
        })?;

        Ok(FormSubmission {
            id: self.id,
            form_id: self.form_id,
            data,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
