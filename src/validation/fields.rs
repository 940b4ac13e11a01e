//! Checks that a form definition declares every field the payment flow reads.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::FieldNode;
use crate::error::SubmissionError;

pub const REQUIRED_FIELDS: [&str; 8] = [
    "amount",
    "expiration_month",
    "expiration_year",
    "name",
    "address",
    "phone",
    "email",
    "direction",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldRequirementValidator;

impl FieldRequirementValidator {
    pub fn new() -> Self {
        Self
    }

    /// Required names that appear nowhere in the tree.
    pub fn missing(&self, elements: &FieldNode) -> BTreeSet<&'static str> {
        let mut missing: BTreeSet<&'static str> = REQUIRED_FIELDS.into_iter().collect();
        if let Some(children) = elements.children() {
            strike_present(children, &mut missing);
        }
        missing
    }

    pub fn validate(&self, elements: &FieldNode) -> Result<(), SubmissionError> {
        let missing = self.missing(elements);
        if missing.is_empty() {
            return Ok(());
        }

        Err(SubmissionError::MissingRequiredFields {
            missing: missing.into_iter().map(str::to_string).collect(),
        })
    }
}

fn strike_present(children: &BTreeMap<String, FieldNode>, missing: &mut BTreeSet<&'static str>) {
    for (key, node) in children {
        if missing.is_empty() {
            return;
        }

        // Positional entries never name a field.
        if !is_numeric_key(key) {
            missing.remove(key.as_str());
        }

        if let Some(grandchildren) = node.children() {
            strike_present(grandchildren, missing);
        }
    }
}

/// Decimal numerals with optional sign, fraction and exponent, e.g. `3`, `-1`, `1.5`, `2e3`.
fn is_numeric_key(key: &str) -> bool {
    let key = key.trim_start();
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
        && key.bytes().any(|b| b.is_ascii_digit())
        && key.parse::<f64>().is_ok()
}
