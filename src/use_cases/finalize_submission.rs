//! Finalize submission use case.
//! Strips personal data the gateway now holds as tokens, then stores the submission.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{FormSubmission, SubmissionData};
use crate::ports::{RepositoryResult, SubmissionRepository};

/// Keys removed from a payload before it is stored.
pub const REDACTED_FIELDS: [&str; 5] = [
    "name",
    "address",
    "expiration_month",
    "expiration_year",
    "microform_container",
];

/// Removes the redacted keys; anything else is kept, missing keys are ignored.
pub fn redact_submission(data: &mut SubmissionData) {
    for field in REDACTED_FIELDS {
        data.remove(field);
    }
}

pub struct FinalizeSubmission {
    submissions: Arc<dyn SubmissionRepository>,
}

impl FinalizeSubmission {
    pub fn new(submissions: Arc<dyn SubmissionRepository>) -> Self {
        Self { submissions }
    }

    pub async fn execute(
        &self,
        form_id: Uuid,
        submission_id: Uuid,
        mut data: SubmissionData,
    ) -> RepositoryResult<FormSubmission> {
        redact_submission(&mut data);
        let stored = self
            .submissions
            .save(&FormSubmission::new(submission_id, form_id, data))
            .await?;

        tracing::info!(form_id = %form_id, submission_id = %submission_id, "Donation submission stored");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubmissionRepository;
    use serde_json::json;

    fn payload() -> SubmissionData {
        SubmissionData::from_value(json!({
            "amount": "25",
            "name": {"first": "Ada", "last": "Lovelace"},
            "address": {"city": "Springfield"},
            "expiration_month": "04",
            "expiration_year": "2030",
            "microform_container": {"token": "tok_abc"},
            "email": "ada@example.com",
            "code": "AAA-1234-5678",
            "payment_entity": 1
        }))
        .unwrap()
    }

    #[test]
    fn redaction_removes_exactly_the_personal_keys() {
        let mut data = payload();
        redact_submission(&mut data);

        for field in REDACTED_FIELDS {
            assert!(!data.contains_key(field), "{} should be removed", field);
        }
        assert!(data.contains_key("amount"));
        assert!(data.contains_key("email"));
        assert!(data.contains_key("code"));
        assert!(data.contains_key("payment_entity"));
    }

    #[test]
    fn redaction_tolerates_missing_keys() {
        let mut data = SubmissionData::from_value(json!({"amount": "5"})).unwrap();
        redact_submission(&mut data);
        assert_eq!(data.to_value(), json!({"amount": "5"}));
    }

    #[tokio::test]
    async fn stores_redacted_payload() {
        let submissions = Arc::new(InMemorySubmissionRepository::new());
        let form_id = Uuid::from_u128(1);
        let submission_id = Uuid::from_u128(2);

        FinalizeSubmission::new(submissions.clone())
            .execute(form_id, submission_id, payload())
            .await
            .unwrap();

        let stored = submissions.get(submission_id).await.unwrap();
        assert_eq!(stored.form_id, form_id);
        assert!(!stored.data.contains_key("microform_container"));
        assert!(!stored.data.contains_key("name"));
    }
}
