//! Payment gateway abstraction.
//!
//! The gateway environment is an argument of every network call rather than
//! client state, so one client serves concurrent submissions for forms bound
//! to different environments.

pub mod cybersource;
pub mod mock;
pub mod signature;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use cybersource::CybersourceClient;
pub use mock::MockGatewayClient;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),

    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),

    #[error("{0}")]
    Tokenization(String),

    #[error("Gateway misconfigured: {0}")]
    Configuration(String),

    #[error("Could not encode payment request: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnvironment {
    Development,
    Production,
}

impl GatewayEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayEnvironment::Development => "development",
            GatewayEnvironment::Production => "production",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "sandbox" => Some(GatewayEnvironment::Development),
            "production" => Some(GatewayEnvironment::Production),
            _ => None,
        }
    }
}

impl fmt::Display for GatewayEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway-side reference for the card data captured by the microform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInformation {
    pub transient_token_jwt: String,
    #[serde(skip)]
    pub jti: Option<String>,
}

/// Billing fields as read from the submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillingFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub locality: Option<String>,
    pub administrative_area: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingInformation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administrative_area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl From<BillingFields> for BillingInformation {
    fn from(fields: BillingFields) -> Self {
        Self {
            first_name: fields.first_name,
            last_name: fields.last_name,
            company: fields.company,
            address1: fields.address1,
            address2: fields.address2,
            locality: fields.locality,
            administrative_area: fields.administrative_area,
            postal_code: fields.postal_code,
            country: fields.country,
            email: fields.email,
            phone_number: fields.phone_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReferenceInformation {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountDetails {
    pub total_amount: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInformation {
    pub amount_details: AmountDetails,
    pub bill_to: BillingInformation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub client_reference_information: ClientReferenceInformation,
    pub order_information: OrderInformation,
    pub token_information: TokenInformation,
}

/// Transaction details from a well-formed gateway reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEnvelope {
    pub id: String,
    pub submit_time_utc: Option<String>,
    pub status: String,
    pub processor_transaction_id: Option<String>,
    pub instrument_identifier_id: Option<String>,
    pub payment_instrument_id: Option<String>,
}

impl TransactionEnvelope {
    pub fn submitted_time(&self) -> Option<DateTime<Utc>> {
        self.submit_time_utc
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|time| time.with_timezone(&Utc))
    }
}

/// Outcome of a payment call that reached the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentReply {
    /// The gateway processed the request; the status may still be a decline.
    Transaction(TransactionEnvelope),
    /// The gateway refused the request outright.
    Failure { message: String },
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the client has what it needs to talk to the processor.
    fn is_ready(&self) -> bool;

    /// Exchanges the microform token for gateway token information.
    async fn create_payment_token(
        &self,
        environment: GatewayEnvironment,
        microform_token: &str,
    ) -> Result<TokenInformation, GatewayError>;

    fn create_billing_information(&self, fields: BillingFields) -> BillingInformation {
        BillingInformation::from(fields)
    }

    fn create_client_reference_information(&self, code: &str) -> ClientReferenceInformation {
        ClientReferenceInformation {
            code: code.to_string(),
        }
    }

    fn create_order_information_amount_details(
        &self,
        total_amount: &str,
        currency: &str,
    ) -> AmountDetails {
        AmountDetails {
            total_amount: total_amount.to_string(),
            currency: currency.to_string(),
        }
    }

    fn create_order_information(
        &self,
        amount_details: AmountDetails,
        bill_to: BillingInformation,
    ) -> OrderInformation {
        OrderInformation {
            amount_details,
            bill_to,
        }
    }

    fn create_payment_request(
        &self,
        client_reference_information: ClientReferenceInformation,
        order_information: OrderInformation,
        token_information: TokenInformation,
    ) -> PaymentRequest {
        PaymentRequest {
            client_reference_information,
            order_information,
            token_information,
        }
    }

    async fn create_payment(
        &self,
        environment: GatewayEnvironment,
        request: &PaymentRequest,
    ) -> Result<PaymentReply, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_environment_names() {
        assert_eq!(
            GatewayEnvironment::parse("sandbox"),
            Some(GatewayEnvironment::Development)
        );
        assert_eq!(
            GatewayEnvironment::parse(" Production "),
            Some(GatewayEnvironment::Production)
        );
        assert_eq!(GatewayEnvironment::parse(""), None);
        assert_eq!(GatewayEnvironment::Development.to_string(), "development");
    }

    #[test]
    fn payment_request_uses_gateway_field_names() {
        let request = PaymentRequest {
            client_reference_information: ClientReferenceInformation {
                code: "AAA-1000-2000".to_string(),
            },
            order_information: OrderInformation {
                amount_details: AmountDetails {
                    total_amount: "25.00".to_string(),
                    currency: "USD".to_string(),
                },
                bill_to: BillingInformation {
                    first_name: Some("Ada".to_string()),
                    phone_number: Some("555-0100".to_string()),
                    ..Default::default()
                },
            },
            token_information: TokenInformation {
                transient_token_jwt: "a.b.c".to_string(),
                jti: Some("ignored".to_string()),
            },
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "clientReferenceInformation": {"code": "AAA-1000-2000"},
                "orderInformation": {
                    "amountDetails": {"totalAmount": "25.00", "currency": "USD"},
                    "billTo": {"firstName": "Ada", "phoneNumber": "555-0100"}
                },
                "tokenInformation": {"transientTokenJwt": "a.b.c"}
            })
        );
    }

    #[test]
    fn envelope_parses_submit_time() {
        let envelope = TransactionEnvelope {
            id: "pay_1".to_string(),
            submit_time_utc: Some("2024-05-01T12:30:00Z".to_string()),
            status: "AUTHORIZED".to_string(),
            processor_transaction_id: None,
            instrument_identifier_id: None,
            payment_instrument_id: None,
        };
        let submitted = envelope.submitted_time().unwrap();
        assert_eq!(submitted.to_rfc3339(), "2024-05-01T12:30:00+00:00");

        let unparsable = TransactionEnvelope {
            submit_time_utc: Some("yesterday".to_string()),
            ..envelope
        };
        assert!(unparsable.submitted_time().is_none());
    }
}
