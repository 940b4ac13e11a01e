//! Domain entities.

pub mod form;
pub mod payment;

pub use form::{FieldNode, FormDefinition, FormStatus, FormSubmission, SubmissionData};
pub use payment::{NewPaymentRecord, PaymentFields, PaymentRecord, PaymentRecordFactory};
