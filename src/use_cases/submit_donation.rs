//! Submit donation use case.
//! Runs one submission through validation, tokenization, the payment call and
//! record creation. Every failure before a well-formed gateway reply leaves no
//! payment record behind.

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::settings::SettingsCache;
use crate::domain::payment::{
    generate_reference_code, normalize_amount, TransactionStatus, DEFAULT_CURRENCY,
};
use crate::domain::{
    FormDefinition, FormStatus, PaymentFields, PaymentRecord, PaymentRecordFactory,
    SubmissionData,
};
use crate::error::{SubmissionError, SubmissionStage};
use crate::gateway::{
    BillingFields, GatewayClient, GatewayEnvironment, GatewayError, PaymentReply,
    TokenInformation, TransactionEnvelope,
};
use crate::ports::PaymentRepository;
use crate::use_cases::resolve_environment::{EnvironmentResolver, ResolvedEnvironment};
use crate::validation::{parse_amount, sanitize_string, FieldRequirementValidator};

/// Form element that decline messages attach to.
pub const PAYMENT_DETAILS_ELEMENT: &str = "payment_details";

pub const DECLINED_MESSAGE: &str = "Your payment request was declined.";
pub const INVALID_REQUEST_MESSAGE: &str = "Your payment request was invalid.";

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct DonationInput {
    pub form: FormDefinition,
    /// Id the submission will be stored under.
    pub submission_id: Uuid,
    pub data: SubmissionData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Accepted,
    Declined,
    InvalidRequest,
}

impl SubmissionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionOutcome::Accepted => "accepted",
            SubmissionOutcome::Declined => "declined",
            SubmissionOutcome::InvalidRequest => "invalid_request",
        }
    }
}

/// Message shown against a form element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormMessage {
    pub element: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct DonationOutput {
    pub outcome: SubmissionOutcome,
    pub payment: PaymentRecord,
    /// Submission payload with `environment`, `code`, `payment_id`,
    /// `payment_entity` and `status` written in.
    pub data: SubmissionData,
    pub message: Option<FormMessage>,
}

/// Use case for submitting a donation payment.
pub struct SubmitDonation {
    gateway: Arc<dyn GatewayClient>,
    payment_repository: Arc<dyn PaymentRepository>,
    settings: Arc<SettingsCache>,
    records: PaymentRecordFactory,
    validator: FieldRequirementValidator,
    gateway_timeout: Duration,
}

impl SubmitDonation {
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        payment_repository: Arc<dyn PaymentRepository>,
        settings: Arc<SettingsCache>,
    ) -> Self {
        Self {
            gateway,
            payment_repository,
            settings,
            records: PaymentRecordFactory::new(),
            validator: FieldRequirementValidator::new(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_gateway_timeout(mut self, gateway_timeout: Duration) -> Self {
        self.gateway_timeout = gateway_timeout;
        self
    }

    pub fn with_record_factory(mut self, records: PaymentRecordFactory) -> Self {
        self.records = records;
        self
    }

    pub async fn execute(&self, input: DonationInput) -> Result<DonationOutput, SubmissionError> {
        let form_id = input.form.id;

        match self.run(input).await {
            Ok(output) => {
                tracing::info!(
                    form_id = %form_id,
                    code = %output.payment.code,
                    status = %output.payment.status,
                    outcome = output.outcome.as_str(),
                    "Donation submission processed"
                );
                Ok(output)
            }
            Err(e) => {
                match &e {
                    SubmissionError::MissingRequiredFields { missing } => tracing::warn!(
                        form_id = %form_id,
                        stage = %e.stage(),
                        missing = ?missing,
                        "Donation form is missing required fields"
                    ),
                    SubmissionError::Storage(_) => {}
                    _ => tracing::warn!(
                        form_id = %form_id,
                        stage = %e.stage(),
                        error = %e,
                        "Donation submission rejected"
                    ),
                }
                Err(e)
            }
        }
    }

    async fn run(&self, input: DonationInput) -> Result<DonationOutput, SubmissionError> {
        let DonationInput {
            form,
            submission_id,
            mut data,
        } = input;

        // Validating
        trace_stage(form.id, SubmissionStage::Validating);
        if form.status == FormStatus::Closed {
            return Err(SubmissionError::FormClosed);
        }
        self.validator.validate(&form.elements)?;
        let amount_text = normalize_amount(&data.text(&["amount"]).unwrap_or_default());
        let amount = parse_amount(&amount_text)
            .map_err(|e| SubmissionError::InvalidAmount(e.message))?;

        // Tokenizing
        trace_stage(form.id, SubmissionStage::Tokenizing);
        let microform_token = data
            .text(&["microform_container", "token"])
            .filter(|token| !token.is_empty())
            .ok_or(SubmissionError::NoPaymentDetected)?;

        let resolved = {
            let settings = self.settings.snapshot();
            EnvironmentResolver::new(&settings).resolve(form.id, self.gateway.is_ready())
        };
        data.insert("environment", resolved.environment.clone());
        let environment = resolved
            .gateway_environment()
            .ok_or(SubmissionError::GatewayNotReady)?;
        let token_information = self.tokenize(environment, &microform_token).await?;

        // BuildingRequest
        trace_stage(form.id, SubmissionStage::BuildingRequest);
        let code = generate_reference_code(&resolved.code_prefix, &mut rand::rng());
        data.insert("code", code.clone());
        let request = {
            let gateway = &self.gateway;
            let bill_to = gateway.create_billing_information(billing_fields(&data));
            let reference = gateway.create_client_reference_information(&code);
            let amount_details =
                gateway.create_order_information_amount_details(&amount_text, DEFAULT_CURRENCY);
            let order = gateway.create_order_information(amount_details, bill_to);
            gateway.create_payment_request(reference, order, token_information)
        };

        // Submitting
        trace_stage(form.id, SubmissionStage::Submitting);
        let reply = self
            .bounded(self.gateway.create_payment(environment, &request))
            .await
            .map_err(|e| match e {
                BoundedError::TimedOut => SubmissionError::GatewayError(format!(
                    "Payment gateway did not respond within {} seconds.",
                    self.gateway_timeout.as_secs()
                )),
                BoundedError::Gateway(e) => SubmissionError::GatewayError(e.to_string()),
            })?;

        // Interpreting
        trace_stage(form.id, SubmissionStage::Interpreting);
        let envelope = match reply {
            PaymentReply::Transaction(envelope) => envelope,
            PaymentReply::Failure { message } => {
                return Err(SubmissionError::GatewayError(message))
            }
        };
        data.insert("payment_id", envelope.id.clone());

        // Persisting
        trace_stage(form.id, SubmissionStage::Persisting);
        let payment = self
            .persist(&resolved, code, amount, envelope, submission_id)
            .await?;
        data.insert("payment_entity", payment.id);
        data.insert("status", payment.status.clone());

        // Finalizing
        trace_stage(form.id, SubmissionStage::Finalizing);
        let (outcome, message) = match TransactionStatus::from(payment.status.as_str()) {
            TransactionStatus::Declined => (
                SubmissionOutcome::Declined,
                Some(FormMessage {
                    element: PAYMENT_DETAILS_ELEMENT,
                    message: DECLINED_MESSAGE.to_string(),
                }),
            ),
            TransactionStatus::InvalidRequest => (
                SubmissionOutcome::InvalidRequest,
                Some(FormMessage {
                    element: PAYMENT_DETAILS_ELEMENT,
                    message: INVALID_REQUEST_MESSAGE.to_string(),
                }),
            ),
            TransactionStatus::Authorized | TransactionStatus::Other(_) => {
                (SubmissionOutcome::Accepted, None)
            }
        };

        Ok(DonationOutput {
            outcome,
            payment,
            data,
            message,
        })
    }

    async fn tokenize(
        &self,
        environment: GatewayEnvironment,
        microform_token: &str,
    ) -> Result<TokenInformation, SubmissionError> {
        self.bounded(
            self.gateway
                .create_payment_token(environment, microform_token),
        )
        .await
        .map_err(|e| match e {
            BoundedError::TimedOut => SubmissionError::TokenizationFailed(format!(
                "gateway did not respond within {} seconds",
                self.gateway_timeout.as_secs()
            )),
            BoundedError::Gateway(e) => SubmissionError::TokenizationFailed(e.to_string()),
        })
    }

    async fn persist(
        &self,
        resolved: &ResolvedEnvironment,
        code: String,
        amount: BigDecimal,
        envelope: TransactionEnvelope,
        submission_id: Uuid,
    ) -> Result<PaymentRecord, SubmissionError> {
        let submitted_time = envelope.submitted_time();
        let record = self.records.create(PaymentFields {
            uuid: None,
            code,
            submitted_time,
            payment_id: Some(envelope.id),
            card_token: envelope.instrument_identifier_id,
            payment_instrument_id: envelope.payment_instrument_id,
            authorized_amount: amount,
            currency: DEFAULT_CURRENCY.to_string(),
            transaction_id: envelope.processor_transaction_id,
            status: envelope.status,
            recurring: false,
            environment: resolved.environment.clone(),
            submission_ref: Some(submission_id),
        });

        self.payment_repository
            .insert(&record)
            .await
            .map_err(|e| {
                tracing::error!(
                    code = %record.code,
                    payment_id = ?record.payment_id,
                    status = %record.status,
                    "Gateway accepted a payment that could not be recorded: {}",
                    e
                );
                SubmissionError::Storage(e)
            })
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, BoundedError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match timeout(self.gateway_timeout, call).await {
            Ok(result) => result.map_err(BoundedError::Gateway),
            Err(_) => Err(BoundedError::TimedOut),
        }
    }
}

enum BoundedError {
    TimedOut,
    Gateway(GatewayError),
}

fn trace_stage(form_id: Uuid, stage: SubmissionStage) {
    tracing::debug!(form_id = %form_id, stage = %stage, "Donation submission stage");
}

fn billing_fields(data: &SubmissionData) -> BillingFields {
    let field = |path: &[&str]| data.text(path).map(|value| sanitize_string(&value));

    BillingFields {
        first_name: field(&["name", "first"]),
        last_name: field(&["name", "last"]),
        company: field(&["company"]),
        address1: field(&["address", "address"]),
        address2: field(&["address", "address_2"]),
        locality: field(&["address", "city"]),
        administrative_area: field(&["address", "state_province"]),
        postal_code: field(&["address", "postal_code"]),
        country: field(&["address", "country"]),
        email: field(&["email"]),
        phone_number: field(&["phone"]),
    }
}
