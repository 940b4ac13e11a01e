//! Scripted in-process gateway.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{
    GatewayClient, GatewayEnvironment, GatewayError, PaymentReply, PaymentRequest,
    TokenInformation, TransactionEnvelope,
};

pub struct MockGatewayClient {
    ready: bool,
    status: String,
    payment_id: Option<String>,
    tokenization_error: Option<String>,
    transport_error: Option<String>,
    refusal: Option<String>,
    latency: Option<Duration>,
    token_calls: AtomicUsize,
    payment_calls: AtomicUsize,
    requests: Mutex<Vec<(GatewayEnvironment, PaymentRequest)>>,
}

impl MockGatewayClient {
    /// A ready gateway that authorizes everything.
    pub fn new() -> Self {
        Self {
            ready: true,
            status: "AUTHORIZED".to_string(),
            payment_id: None,
            tokenization_error: None,
            transport_error: None,
            refusal: None,
            latency: None,
            token_calls: AtomicUsize::new(0),
            payment_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Accepts `ALWAYS_AUTHORIZE`, `ALWAYS_DECLINE`, `ALWAYS_INVALID` and `ALWAYS_ERROR`;
    /// anything else authorizes.
    pub fn from_behavior(behavior: &str) -> Self {
        match behavior {
            "ALWAYS_DECLINE" => Self::new().with_status("DECLINED"),
            "ALWAYS_INVALID" => Self::new().with_status("INVALID_REQUEST"),
            "ALWAYS_ERROR" => Self::new().with_transport_error("mock gateway unavailable"),
            _ => Self::new(),
        }
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn with_payment_id(mut self, payment_id: &str) -> Self {
        self.payment_id = Some(payment_id.to_string());
        self
    }

    pub fn with_tokenization_error(mut self, message: &str) -> Self {
        self.tokenization_error = Some(message.to_string());
        self
    }

    pub fn with_transport_error(mut self, message: &str) -> Self {
        self.transport_error = Some(message.to_string());
        self
    }

    /// The gateway answers but refuses the request.
    pub fn with_refusal(mut self, message: &str) -> Self {
        self.refusal = Some(message.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn payment_calls(&self) -> usize {
        self.payment_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(GatewayEnvironment, PaymentRequest)> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockGatewayClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayClient for MockGatewayClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn create_payment_token(
        &self,
        _environment: GatewayEnvironment,
        microform_token: &str,
    ) -> Result<TokenInformation, GatewayError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(message) = &self.tokenization_error {
            return Err(GatewayError::Tokenization(message.clone()));
        }

        Ok(TokenInformation {
            transient_token_jwt: microform_token.to_string(),
            jti: None,
        })
    }

    async fn create_payment(
        &self,
        environment: GatewayEnvironment,
        request: &PaymentRequest,
    ) -> Result<PaymentReply, GatewayError> {
        self.payment_calls.fetch_add(1, Ordering::SeqCst);
        match self.requests.lock() {
            Ok(mut requests) => requests.push((environment, request.clone())),
            Err(poisoned) => poisoned.into_inner().push((environment, request.clone())),
        }
        self.simulate_latency().await;

        if let Some(message) = &self.transport_error {
            return Err(GatewayError::InvalidResponse(message.clone()));
        }
        if let Some(message) = &self.refusal {
            return Ok(PaymentReply::Failure {
                message: message.clone(),
            });
        }

        let id = self
            .payment_id
            .clone()
            .unwrap_or_else(|| format!("mock_txn_{}", uuid::Uuid::new_v4()));

        Ok(PaymentReply::Transaction(TransactionEnvelope {
            id,
            submit_time_utc: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            status: self.status.clone(),
            processor_transaction_id: Some("MOCK_PROCESSOR_TXN".to_string()),
            instrument_identifier_id: None,
            payment_instrument_id: None,
        }))
    }
}
