use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use donation_capture::adapters::{
    InMemoryFormRepository, InMemoryPaymentRepository, InMemorySubmissionRepository,
};
use donation_capture::config::settings::{GatewaySettings, SettingsCache, GLOBAL_AUTH_KEY};
use donation_capture::domain::{FieldNode, FormDefinition, FormStatus};
use donation_capture::gateway::MockGatewayClient;
use donation_capture::validation::REQUIRED_FIELDS;
use donation_capture::{create_app, AppOptions, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

const FORM_ID: u128 = 0x5eed;

struct TestApp {
    router: Router,
    forms: Arc<InMemoryFormRepository>,
    payments: Arc<InMemoryPaymentRepository>,
    submissions: Arc<InMemorySubmissionRepository>,
}

fn form(status: FormStatus) -> FormDefinition {
    FormDefinition {
        id: Uuid::from_u128(FORM_ID),
        title: "Year-end giving".to_string(),
        status,
        elements: FieldNode::group(REQUIRED_FIELDS.iter().map(|name| (*name, FieldNode::Leaf))),
    }
}

fn setup(gateway: MockGatewayClient) -> TestApp {
    let forms = Arc::new(InMemoryFormRepository::with_forms([form(FormStatus::Open)]));
    let payments = Arc::new(InMemoryPaymentRepository::new());
    let submissions = Arc::new(InMemorySubmissionRepository::new());
    let settings = GatewaySettings::new().with(GLOBAL_AUTH_KEY, "development");

    let state = AppState::new(
        None,
        Arc::new(gateway),
        Arc::new(SettingsCache::new(settings)),
        forms.clone(),
        payments.clone(),
        submissions.clone(),
        Duration::from_secs(5),
    );

    TestApp {
        router: create_app(state, AppOptions::default()),
        forms,
        payments,
        submissions,
    }
}

fn donation(token: &str) -> Value {
    json!({
        "data": {
            "amount": "15",
            "name": {"first": "Katherine", "last": "Johnson"},
            "address": {"address": "1 Langley Rd", "city": "Hampton", "postal_code": "23666", "country": "US"},
            "email": "kj@example.org",
            "phone": "555-0142",
            "microform_container": {"token": token}
        }
    })
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn submissions_uri() -> String {
    format!("/forms/{}/submissions", Uuid::from_u128(FORM_ID))
}

#[tokio::test]
async fn test_health_reports_in_memory_storage() {
    let app = setup(MockGatewayClient::new());

    let (status, body) = send(&app.router, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "in_memory");
    assert_eq!(body["gateway"], "mock");
    assert_eq!(body["gateway_ready"], true);
}

#[tokio::test]
async fn test_get_form_returns_resolved_environment() {
    let app = setup(MockGatewayClient::new());

    let uri = format!("/forms/{}", Uuid::from_u128(FORM_ID));
    let (status, body) = send(&app.router, get(&uri)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "open");
    assert_eq!(body["environment"], "development");
    assert_eq!(body["code_prefix"], "AAA");
    assert_eq!(body["gateway_ready"], true);
}

#[tokio::test]
async fn test_get_form_closes_form_when_gateway_not_ready() {
    let app = setup(MockGatewayClient::new().not_ready());

    let uri = format!("/forms/{}", Uuid::from_u128(FORM_ID));
    let (status, body) = send(&app.router, get(&uri)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "closed");
    assert_eq!(body["environment"], "");
    assert_eq!(body["gateway_ready"], false);
}

#[tokio::test]
async fn test_unknown_form_is_not_found() {
    let app = setup(MockGatewayClient::new());

    let uri = format!("/forms/{}/submissions", Uuid::from_u128(1));
    let (status, _) = send(&app.router, post_json(&uri, &donation("tok_1"))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_accepted_submission_is_created_and_listed() {
    let app = setup(MockGatewayClient::new().with_payment_id("pay_http"));

    let (status, body) = send(&app.router, post_json(&submissions_uri(), &donation("tok_1"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "AUTHORIZED");
    assert!(body["code"].as_str().unwrap().starts_with("AAA-"));
    assert_eq!(app.submissions.count(), 1);
    assert_eq!(app.payments.count(), 1);

    let payment_entity = body["payment_entity"].as_i64().unwrap();
    let (status, payment) = send(&app.router, get(&format!("/payments/{}", payment_entity))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["payment_id"], "pay_http");
    assert_eq!(payment["authorized_amount"], "15.00");

    let (status, list) = send(&app.router, get("/payments?limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_declined_submission_returns_payment_required() {
    let app = setup(MockGatewayClient::from_behavior("ALWAYS_DECLINE"));

    let (status, body) = send(&app.router, post_json(&submissions_uri(), &donation("tok_1"))).await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["element"], "payment_details");
    assert_eq!(body["error"], "Your payment request was declined.");
    assert_eq!(app.payments.count(), 1);
    assert_eq!(app.submissions.count(), 0);
}

#[tokio::test]
async fn test_invalid_request_submission_returns_unprocessable() {
    let app = setup(MockGatewayClient::from_behavior("ALWAYS_INVALID"));

    let (status, body) = send(&app.router, post_json(&submissions_uri(), &donation("tok_1"))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Your payment request was invalid.");
    assert_eq!(app.submissions.count(), 0);
}

#[tokio::test]
async fn test_closed_form_rejects_submission() {
    let app = setup(MockGatewayClient::new());
    app.forms.put(form(FormStatus::Closed));

    let (status, body) = send(&app.router, post_json(&submissions_uri(), &donation("tok_1"))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["element"], "elements");
    assert_eq!(app.payments.count(), 0);
}

#[tokio::test]
async fn test_missing_token_is_bad_request() {
    let app = setup(MockGatewayClient::new());

    let (status, body) = send(&app.router, post_json(&submissions_uri(), &donation(""))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No payment detected.");
    assert_eq!(app.payments.count(), 0);
}

#[tokio::test]
async fn test_non_object_data_is_bad_request() {
    let app = setup(MockGatewayClient::new());

    let (status, _) = send(
        &app.router,
        post_json(&submissions_uri(), &json!({ "data": [1, 2, 3] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_list_rejects_out_of_range_limit() {
    let app = setup(MockGatewayClient::new());

    let (status, _) = send(&app.router, get("/payments?limit=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, get("/payments/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
