use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::ports::RepositoryError;

/// Form element that generic submission errors attach to.
pub const ELEMENTS: &str = "elements";

/// Form element that missing-configuration errors attach to.
pub const AMOUNT_ELEMENT: &str = "amount";

/// Pipeline stage of a donation submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Validating,
    Tokenizing,
    BuildingRequest,
    Submitting,
    Interpreting,
    Persisting,
    Finalizing,
}

impl SubmissionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStage::Validating => "validating",
            SubmissionStage::Tokenizing => "tokenizing",
            SubmissionStage::BuildingRequest => "building_request",
            SubmissionStage::Submitting => "submitting",
            SubmissionStage::Interpreting => "interpreting",
            SubmissionStage::Persisting => "persisting",
            SubmissionStage::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a donation submission is rejected. None of these leave a payment record behind,
/// except `Storage`, which is raised after the gateway already answered.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// The missing names are kept for logs only; the message does not list them.
    #[error("Missing necessary fields for payment transaction. Payment transaction not processed. Contact administrator to update form configuration.")]
    MissingRequiredFields { missing: Vec<String> },

    #[error("This form is closed to new submissions.")]
    FormClosed,

    #[error("Payment client is not ready to deliver information to the processor.")]
    GatewayNotReady,

    #[error("No payment detected.")]
    NoPaymentDetected,

    #[error("Payment details could not be tokenized: {0}")]
    TokenizationFailed(String),

    #[error("Invalid donation amount: {0}")]
    InvalidAmount(String),

    #[error("{0}")]
    GatewayError(String),

    #[error("Payment record could not be saved")]
    Storage(#[from] RepositoryError),
}

impl SubmissionError {
    pub fn stage(&self) -> SubmissionStage {
        match self {
            SubmissionError::MissingRequiredFields { .. }
            | SubmissionError::FormClosed
            | SubmissionError::InvalidAmount(_) => SubmissionStage::Validating,
            SubmissionError::GatewayNotReady
            | SubmissionError::NoPaymentDetected
            | SubmissionError::TokenizationFailed(_) => SubmissionStage::Tokenizing,
            SubmissionError::GatewayError(_) => SubmissionStage::Submitting,
            SubmissionError::Storage(_) => SubmissionStage::Persisting,
        }
    }

    /// Form element the message is shown against.
    pub fn element(&self) -> &'static str {
        match self {
            SubmissionError::MissingRequiredFields { .. } => AMOUNT_ELEMENT,
            _ => ELEMENTS,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            SubmissionError::MissingRequiredFields { .. }
            | SubmissionError::NoPaymentDetected
            | SubmissionError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            SubmissionError::FormClosed => StatusCode::CONFLICT,
            SubmissionError::GatewayNotReady => StatusCode::SERVICE_UNAVAILABLE,
            SubmissionError::TokenizationFailed(_) | SubmissionError::GatewayError(_) => {
                StatusCode::BAD_GATEWAY
            }
            SubmissionError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Repository(RepositoryError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            other => AppError::Repository(other),
        }
    }
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Submission(err) => err.status_code(),
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Repository(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::Submission(err) => json!({
                "error": err.to_string(),
                "element": err.element(),
                "status": status.as_u16(),
            }),
            _ => json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
