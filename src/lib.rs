pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod startup;
pub mod use_cases;
pub mod utils;
pub mod validation;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::settings::SettingsCache;
use crate::gateway::GatewayClient;
use crate::middleware::request_logger::{request_logger_middleware, RequestLogSettings};
use crate::ports::{FormRepository, PaymentRepository, SubmissionRepository};
use crate::use_cases::{FinalizeSubmission, PrepareForm, SubmitDonation};

#[derive(Clone)]
pub struct AppState {
    /// `None` when running on in-memory repositories.
    pub db: Option<sqlx::PgPool>,
    pub gateway: Arc<dyn GatewayClient>,
    pub forms: Arc<dyn FormRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub prepare_form: Arc<PrepareForm>,
    pub submit_donation: Arc<SubmitDonation>,
    pub finalize_submission: Arc<FinalizeSubmission>,
}

impl AppState {
    pub fn new(
        db: Option<sqlx::PgPool>,
        gateway: Arc<dyn GatewayClient>,
        settings: Arc<SettingsCache>,
        forms: Arc<dyn FormRepository>,
        payments: Arc<dyn PaymentRepository>,
        submissions: Arc<dyn SubmissionRepository>,
        gateway_timeout: Duration,
    ) -> Self {
        let prepare_form = PrepareForm::new(forms.clone(), gateway.clone(), settings.clone());
        let submit_donation = SubmitDonation::new(gateway.clone(), payments.clone(), settings)
            .with_gateway_timeout(gateway_timeout);
        let finalize_submission = FinalizeSubmission::new(submissions);

        Self {
            db,
            gateway,
            forms,
            payments,
            prepare_form: Arc::new(prepare_form),
            submit_donation: Arc::new(submit_donation),
            finalize_submission: Arc::new(finalize_submission),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub request_log: RequestLogSettings,
    /// Comma-separated origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,
}

pub fn create_app(state: AppState, options: AppOptions) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/forms/:form_id", get(handlers::forms::get_form))
        .route("/forms/:form_id/submissions", post(handlers::forms::submit))
        .route("/payments", get(handlers::payments::list_payments))
        .route("/payments/:id", get(handlers::payments::get_payment))
        .layer(axum::middleware::from_fn_with_state(
            options.request_log,
            request_logger_middleware,
        ))
        .layer(cors_layer(options.cors_allowed_origins.as_deref()))
        .with_state(state)
}

fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
