//! Storage adapters implementing the ports.

pub mod memory;
pub mod postgres_form_repository;
pub mod postgres_payment_repository;
pub mod postgres_submission_repository;

pub use memory::{InMemoryFormRepository, InMemoryPaymentRepository, InMemorySubmissionRepository};
pub use postgres_form_repository::PostgresFormRepository;
pub use postgres_payment_repository::PostgresPaymentRepository;
pub use postgres_submission_repository::PostgresSubmissionRepository;
