//! Application use cases.

pub mod finalize_submission;
pub mod prepare_form;
pub mod resolve_environment;
pub mod submit_donation;

pub use finalize_submission::{redact_submission, FinalizeSubmission};
pub use prepare_form::{PrepareForm, PreparedForm};
pub use resolve_environment::{EnvironmentResolver, ResolvedEnvironment};
pub use submit_donation::{DonationInput, DonationOutput, SubmissionOutcome, SubmitDonation};
