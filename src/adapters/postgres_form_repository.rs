//! Postgres implementation of FormRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{FieldNode, FormDefinition, FormStatus};
use crate::ports::{FormRepository, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresFormRepository {
    pool: PgPool,
}

impl PostgresFormRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FormRepository for PostgresFormRepository {
    async fn get(&self, id: Uuid) -> RepositoryResult<FormDefinition> {
        let row = sqlx::query_as::<_, FormRow>(
            "SELECT id, title, status, elements FROM forms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("form {}", id)))?
            .into_domain()
    }

    async fn set_status(&self, id: Uuid, status: FormStatus) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE forms SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("form {}", id)));
        }

        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct FormRow {
    id: Uuid,
    title: String,
    status: String,
    elements: serde_json::Value,
}

impl FormRow {
    fn into_domain(self) -> RepositoryResult<FormDefinition> {
        let status = FormStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::Corrupt(format!("form {} has status '{}'", self.id, self.status))
        })?;

        Ok(FormDefinition {
            id: self.id,
            title: self.title,
            status,
            elements: FieldNode::from(&self.elements),
        })
    }
}
