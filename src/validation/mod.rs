use sqlx::types::BigDecimal;
use std::fmt;
use std::str::FromStr;

pub mod fields;

pub use fields::{FieldRequirementValidator, REQUIRED_FIELDS};

pub const AMOUNT_INPUT_MAX_LEN: usize = 64;

/// Cents precision of the stored `authorized_amount`.
pub const AMOUNT_MAX_SCALE: i64 = 2;

/// Largest value a `NUMERIC(12, 2)` amount column holds.
pub const AMOUNT_MAX: &str = "9999999999.99";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

/// Rejects amounts the payment record could not store exactly.
pub fn validate_amount_precision(amount: &BigDecimal) -> ValidationResult {
    if amount.with_scale(AMOUNT_MAX_SCALE) != *amount {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }

    let max = BigDecimal::from_str(AMOUNT_MAX)
        .map_err(|_| ValidationError::new("amount", "maximum is misconfigured"))?;
    if amount > &max {
        return Err(ValidationError::new(
            "amount",
            format!("must not exceed {}", AMOUNT_MAX),
        ));
    }

    Ok(())
}

/// Parses a normalized donation amount into a positive decimal.
pub fn parse_amount(raw: &str) -> Result<BigDecimal, ValidationError> {
    validate_required("amount", raw)?;
    validate_max_len("amount", raw, AMOUNT_INPUT_MAX_LEN)?;

    if raw.chars().any(|ch| ch.is_whitespace() || ch == 'e' || ch == 'E') {
        return Err(ValidationError::new("amount", "must be a plain decimal number"));
    }

    let amount = BigDecimal::from_str(raw)
        .map_err(|_| ValidationError::new("amount", "must be a decimal number"))?;
    validate_positive_amount(&amount)?;
    validate_amount_precision(&amount)?;

    Ok(amount)
}
