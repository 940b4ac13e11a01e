//! In-memory repositories for tests and database-less runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::domain::{FormDefinition, FormStatus, FormSubmission, NewPaymentRecord, PaymentRecord};
use crate::ports::{
    FormRepository, PaymentRepository, RepositoryError, RepositoryResult, SubmissionRepository,
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct InMemoryPaymentRepository {
    records: RwLock<BTreeMap<i64, PaymentRecord>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        read(&self.records).len()
    }

    /// All records in insertion order.
    pub fn all(&self) -> Vec<PaymentRecord> {
        read(&self.records).values().cloned().collect()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, record: &NewPaymentRecord) -> RepositoryResult<PaymentRecord> {
        let mut records = write(&self.records);
        let id = records.keys().next_back().map_or(1, |last| last + 1);
        let stored = record.clone().into_record(id);
        records.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<PaymentRecord> {
        read(&self.records)
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("payment {}", id)))
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<PaymentRecord>> {
        let skip = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);

        Ok(read(&self.records)
            .values()
            .rev()
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn append_recurring_payment(
        &self,
        parent_id: i64,
        child_id: i64,
    ) -> RepositoryResult<PaymentRecord> {
        let mut records = write(&self.records);
        if !records.contains_key(&child_id) {
            return Err(RepositoryError::NotFound(format!("payment {}", child_id)));
        }

        let parent = records
            .get_mut(&parent_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("payment {}", parent_id)))?;
        parent.recurring_payments.push(child_id);
        parent.changed_time = Utc::now();

        Ok(parent.clone())
    }
}

#[derive(Default)]
pub struct InMemoryFormRepository {
    forms: RwLock<HashMap<Uuid, FormDefinition>>,
}

impl InMemoryFormRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forms(forms: impl IntoIterator<Item = FormDefinition>) -> Self {
        Self {
            forms: RwLock::new(forms.into_iter().map(|form| (form.id, form)).collect()),
        }
    }

    pub fn put(&self, form: FormDefinition) {
        write(&self.forms).insert(form.id, form);
    }
}

#[async_trait]
impl FormRepository for InMemoryFormRepository {
    async fn get(&self, id: Uuid) -> RepositoryResult<FormDefinition> {
        read(&self.forms)
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("form {}", id)))
    }

    async fn set_status(&self, id: Uuid, status: FormStatus) -> RepositoryResult<()> {
        let mut forms = write(&self.forms);
        let form = forms
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("form {}", id)))?;
        form.status = status;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySubmissionRepository {
    submissions: RwLock<HashMap<Uuid, FormSubmission>>,
}

impl InMemorySubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        read(&self.submissions).len()
    }
}

#[async_trait]
impl SubmissionRepository for InMemorySubmissionRepository {
    async fn save(&self, submission: &FormSubmission) -> RepositoryResult<FormSubmission> {
        let mut submissions = write(&self.submissions);
        let mut stored = submission.clone();
        if let Some(existing) = submissions.get(&submission.id) {
            stored.created_at = existing.created_at;
        }
        submissions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<FormSubmission> {
        read(&self.submissions)
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("submission {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PaymentFields, PaymentRecordFactory, SubmissionData};
    use bigdecimal::BigDecimal;

    fn new_record(code: &str) -> NewPaymentRecord {
        PaymentRecordFactory::new().create(PaymentFields {
            uuid: None,
            code: code.to_string(),
            submitted_time: None,
            payment_id: None,
            card_token: None,
            payment_instrument_id: None,
            authorized_amount: BigDecimal::from(10),
            currency: "USD".to_string(),
            transaction_id: None,
            status: "AUTHORIZED".to_string(),
            recurring: false,
            environment: "development".to_string(),
            submission_ref: None,
        })
    }

    #[tokio::test]
    async fn assigns_increasing_ids_and_lists_newest_first() {
        let repo = InMemoryPaymentRepository::new();
        let first = repo.insert(&new_record("AAA-1000-1000")).await.unwrap();
        let second = repo.insert(&new_record("AAA-2000-2000")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let listed = repo.list(10, 0).await.unwrap();
        assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(repo.list(1, 1).await.unwrap()[0].id, 1);
    }

    #[tokio::test]
    async fn appends_recurring_links_in_order() {
        let repo = InMemoryPaymentRepository::new();
        let parent = repo.insert(&new_record("AAA-1000-1000")).await.unwrap();
        let a = repo.insert(&new_record("AAA-1000-1001")).await.unwrap();
        let b = repo.insert(&new_record("AAA-1000-1002")).await.unwrap();

        repo.append_recurring_payment(parent.id, b.id).await.unwrap();
        let updated = repo.append_recurring_payment(parent.id, a.id).await.unwrap();

        assert_eq!(updated.recurring_payments, vec![b.id, a.id]);
        assert!(updated.changed_time >= parent.changed_time);
        assert!(matches!(
            repo.append_recurring_payment(parent.id, 99).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn saving_a_submission_twice_replaces_data() {
        let repo = InMemorySubmissionRepository::new();
        let id = Uuid::from_u128(3);
        let mut data = SubmissionData::new();
        data.insert("amount", "5");
        repo.save(&FormSubmission::new(id, Uuid::from_u128(1), data.clone()))
            .await
            .unwrap();

        data.insert("status", "AUTHORIZED");
        repo.save(&FormSubmission::new(id, Uuid::from_u128(1), data))
            .await
            .unwrap();

        assert_eq!(repo.count(), 1);
        assert!(repo.get(id).await.unwrap().data.contains_key("status"));
    }
}
