use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::SubmissionData;
use crate::error::AppError;
use crate::ports::FormRepository;
use crate::use_cases::{DonationInput, SubmissionOutcome};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmissionRequest {
    pub data: Value,
}

pub async fn get_form(
    State(state): State<AppState>,
    Path(form_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let prepared = state.prepare_form.execute(form_id).await?;

    Ok(Json(json!({
        "id": prepared.form.id,
        "title": prepared.form.title,
        "status": prepared.form.status,
        "environment": prepared.environment.environment,
        "code_prefix": prepared.environment.code_prefix,
        "gateway_ready": prepared.gateway_ready,
    })))
}

pub async fn submit(
    State(state): State<AppState>,
    Path(form_id): Path<Uuid>,
    Json(request): Json<SubmissionRequest>,
) -> Result<Response, AppError> {
    let data = SubmissionData::from_value(request.data)
        .ok_or_else(|| AppError::BadRequest("data must be a JSON object".to_string()))?;
    let form = state.forms.get(form_id).await?;
    let submission_id = Uuid::new_v4();

    let output = state
        .submit_donation
        .execute(DonationInput {
            form,
            submission_id,
            data,
        })
        .await?;

    let payment = &output.payment;
    let (status_code, message) = match (output.outcome, &output.message) {
        (SubmissionOutcome::Accepted, _) | (_, None) => {
            let stored = state
                .finalize_submission
                .execute(form_id, submission_id, output.data.clone())
                .await
                .map_err(|e| {
                    tracing::error!(
                        form_id = %form_id,
                        code = %payment.code,
                        payment_entity = payment.id,
                        "Accepted donation could not be stored: {}",
                        e
                    );
                    AppError::from(e)
                })?;

            return Ok((
                StatusCode::CREATED,
                Json(json!({
                    "submission_id": stored.id,
                    "status": payment.status,
                    "code": payment.code,
                    "payment_entity": payment.id,
                })),
            )
                .into_response());
        }
        (SubmissionOutcome::Declined, Some(message)) => (StatusCode::PAYMENT_REQUIRED, message),
        (SubmissionOutcome::InvalidRequest, Some(message)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, message)
        }
    };

    Ok((
        status_code,
        Json(json!({
            "error": message.message,
            "element": message.element,
            "status": status_code.as_u16(),
            "payment_entity": payment.id,
        })),
    )
        .into_response())
}
