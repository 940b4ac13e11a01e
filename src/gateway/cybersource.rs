use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::signature::{self, SigningKey};
use super::{
    GatewayClient, GatewayEnvironment, GatewayError, PaymentReply, PaymentRequest,
    TokenInformation, TransactionEnvelope,
};
use crate::config::GatewayConfig;

pub const PAYMENTS_PATH: &str = "/pts/v2/payments";

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

#[derive(Debug, Clone, Default)]
pub struct CybersourceCredentials {
    pub merchant_id: String,
    pub key_id: String,
    pub shared_secret: String,
}

impl CybersourceCredentials {
    fn is_complete(&self) -> bool {
        !self.merchant_id.is_empty() && !self.key_id.is_empty() && !self.shared_secret.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponseBody {
    id: Option<String>,
    submit_time_utc: Option<String>,
    status: Option<String>,
    message: Option<String>,
    processor_information: Option<ProcessorInformation>,
    token_information: Option<ResponseTokenInformation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessorInformation {
    transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseTokenInformation {
    instrument_identifier: Option<IdHolder>,
    payment_instrument: Option<IdHolder>,
}

#[derive(Debug, Deserialize)]
struct IdHolder {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransientTokenClaims {
    jti: Option<String>,
    exp: Option<i64>,
}

/// HTTP client for the CyberSource payments API
#[derive(Clone)]
pub struct CybersourceClient {
    client: Client,
    credentials: CybersourceCredentials,
    sandbox_url: String,
    production_url: String,
    circuit_breaker: Breaker,
}

impl CybersourceClient {
    pub fn new(credentials: CybersourceCredentials, timeout: Duration) -> Self {
        Self::with_circuit_breaker(
            credentials,
            crate::config::DEFAULT_SANDBOX_URL.to_string(),
            crate::config::DEFAULT_PRODUCTION_URL.to_string(),
            timeout,
            3,
            60,
        )
    }

    /// Creates a client with custom base URLs and circuit breaker configuration
    pub fn with_circuit_breaker(
        credentials: CybersourceCredentials,
        sandbox_url: String,
        production_url: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = build_http_client(timeout);

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        CybersourceClient {
            client,
            credentials,
            sandbox_url,
            production_url,
            circuit_breaker,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::with_circuit_breaker(
            CybersourceCredentials {
                merchant_id: config.merchant_id.clone(),
                key_id: config.key_id.clone(),
                shared_secret: config.shared_secret.clone(),
            },
            config.sandbox_url.clone(),
            config.production_url.clone(),
            config.timeout(),
            3,
            60,
        )
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    fn base_url(&self, environment: GatewayEnvironment) -> &str {
        match environment {
            GatewayEnvironment::Development => &self.sandbox_url,
            GatewayEnvironment::Production => &self.production_url,
        }
    }
}

#[async_trait]
impl GatewayClient for CybersourceClient {
    fn name(&self) -> &'static str {
        "cybersource"
    }

    fn is_ready(&self) -> bool {
        self.credentials.is_complete()
    }

    async fn create_payment_token(
        &self,
        _environment: GatewayEnvironment,
        microform_token: &str,
    ) -> Result<TokenInformation, GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::Configuration(
                "merchant credentials are incomplete".to_string(),
            ));
        }

        let jti = decode_transient_token(microform_token)?;
        Ok(TokenInformation {
            transient_token_jwt: microform_token.to_string(),
            jti,
        })
    }

    async fn create_payment(
        &self,
        environment: GatewayEnvironment,
        request: &PaymentRequest,
    ) -> Result<PaymentReply, GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::Configuration(
                "merchant credentials are incomplete".to_string(),
            ));
        }

        let url = format!(
            "{}{}",
            self.base_url(environment).trim_end_matches('/'),
            PAYMENTS_PATH
        );
        let host = host_header(&url)?;
        let body = serde_json::to_vec(request)?;
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let signed = signature::sign(
            &SigningKey {
                merchant_id: &self.credentials.merchant_id,
                key_id: &self.credentials.key_id,
                shared_secret: &self.credentials.shared_secret,
            },
            &host,
            &date,
            "post",
            PAYMENTS_PATH,
            &body,
        )?;

        let client = self.client.clone();
        let merchant_id = self.credentials.merchant_id.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .header("v-c-merchant-id", merchant_id)
                    .header("Date", date)
                    .header("Host", host)
                    .header("Digest", signed.digest)
                    .header("Signature", signed.signature)
                    .header("Content-Type", "application/json")
                    .body(body)
                    .send()
                    .await?;

                let status = response.status();
                let text = response.text().await?;
                if status.is_server_error() {
                    return Err(GatewayError::InvalidResponse(format!(
                        "Gateway returned HTTP {}",
                        status.as_u16()
                    )));
                }
                parse_payment_reply(status, &text)
            })
            .await;

        match result {
            Ok(reply) => Ok(reply),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitBreakerOpen(
                "CyberSource API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

/// Falls back to reqwest's default client, which has no request timeout, and says so.
fn build_http_client(timeout: Duration) -> Client {
    match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(
                timeout_secs = timeout.as_secs(),
                "CyberSource HTTP client could not be built, using defaults without a timeout: {}",
                e
            );
            Client::default()
        }
    }
}

fn host_header(url: &str) -> Result<String, GatewayError> {
    let parsed =
        Url::parse(url).map_err(|e| GatewayError::Configuration(format!("bad base URL: {}", e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| GatewayError::Configuration(format!("base URL has no host: {}", url)))?;

    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Checks that the microform token is a well-formed, unexpired JWT and returns its `jti`.
pub fn decode_transient_token(token: &str) -> Result<Option<String>, GatewayError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
        return Err(GatewayError::Tokenization(
            "transient token is not a JWT".to_string(),
        ));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| GatewayError::Tokenization("transient token payload is not base64url".to_string()))?;
    let claims: TransientTokenClaims = serde_json::from_slice(&payload)
        .map_err(|_| GatewayError::Tokenization("transient token payload is not JSON".to_string()))?;

    if let Some(exp) = claims.exp {
        if exp <= Utc::now().timestamp() {
            return Err(GatewayError::Tokenization(
                "transient token has expired".to_string(),
            ));
        }
    }

    Ok(claims.jti)
}

/// Bodies carrying both `id` and `status` describe a processed transaction whatever the
/// HTTP status; any other non-2xx body is a refusal.
pub fn parse_payment_reply(status: StatusCode, body: &str) -> Result<PaymentReply, GatewayError> {
    let parsed: Option<PaymentResponseBody> = serde_json::from_str(body).ok();

    if let Some(PaymentResponseBody {
        id: Some(id),
        status: Some(transaction_status),
        submit_time_utc,
        processor_information,
        token_information,
        ..
    }) = parsed
    {
        let (instrument_identifier_id, payment_instrument_id) = match token_information {
            Some(tokens) => (
                tokens.instrument_identifier.and_then(|holder| holder.id),
                tokens.payment_instrument.and_then(|holder| holder.id),
            ),
            None => (None, None),
        };

        return Ok(PaymentReply::Transaction(TransactionEnvelope {
            id,
            submit_time_utc,
            status: transaction_status,
            processor_transaction_id: processor_information.and_then(|info| info.transaction_id),
            instrument_identifier_id,
            payment_instrument_id,
        }));
    }

    if status.is_success() {
        return Err(GatewayError::InvalidResponse(
            "reply is missing the transaction id or status".to_string(),
        ));
    }

    let message = serde_json::from_str::<PaymentResponseBody>(body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("Gateway returned HTTP {}", status.as_u16()));

    Ok(PaymentReply::Failure { message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{
        AmountDetails, BillingInformation, ClientReferenceInformation, OrderInformation,
    };

    fn credentials() -> CybersourceCredentials {
        CybersourceCredentials {
            merchant_id: "donations_test".to_string(),
            key_id: "key-1".to_string(),
            shared_secret: "c2hhcmVkLXNlY3JldA==".to_string(),
        }
    }

    fn jwt(payload: &str) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode("sig")
        )
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            client_reference_information: ClientReferenceInformation {
                code: "AAA-1111-2222".to_string(),
            },
            order_information: OrderInformation {
                amount_details: AmountDetails {
                    total_amount: "25.00".to_string(),
                    currency: "USD".to_string(),
                },
                bill_to: BillingInformation::default(),
            },
            token_information: TokenInformation {
                transient_token_jwt: jwt(r#"{"jti":"abc"}"#),
                jti: Some("abc".to_string()),
            },
        }
    }

    fn client_for(url: String) -> CybersourceClient {
        CybersourceClient::with_circuit_breaker(
            credentials(),
            url.clone(),
            url,
            Duration::from_secs(5),
            3,
            1,
        )
    }

    #[test]
    fn test_readiness_requires_credentials() {
        let client = CybersourceClient::new(credentials(), Duration::from_secs(5));
        assert!(client.is_ready());

        let client = CybersourceClient::new(CybersourceCredentials::default(), Duration::from_secs(5));
        assert!(!client.is_ready());
    }

    #[test]
    fn test_circuit_breaker_state() {
        let client = CybersourceClient::new(credentials(), Duration::from_secs(5));
        assert_eq!(client.circuit_state(), "closed");
    }

    #[test]
    fn test_decode_transient_token() {
        assert_eq!(
            decode_transient_token(&jwt(r#"{"jti":"1E3GQY1RNKBG6IBD2EP93C43PIZ2NQ6SQLUIM3S16BGLHTY4IIEK5EB1AE5D73A4"}"#)).unwrap(),
            Some("1E3GQY1RNKBG6IBD2EP93C43PIZ2NQ6SQLUIM3S16BGLHTY4IIEK5EB1AE5D73A4".to_string())
        );
        assert!(decode_transient_token("tok_abc").is_err());
        assert!(decode_transient_token("a..c").is_err());
        assert!(decode_transient_token(&jwt("not json")).is_err());
        assert!(matches!(
            decode_transient_token(&jwt(r#"{"jti":"x","exp":1}"#)),
            Err(GatewayError::Tokenization(_))
        ));
    }

    #[test]
    fn test_host_header_keeps_port() {
        assert_eq!(
            host_header("http://127.0.0.1:1234/pts/v2/payments").unwrap(),
            "127.0.0.1:1234"
        );
        assert_eq!(
            host_header("https://apitest.cybersource.com/pts/v2/payments").unwrap(),
            "apitest.cybersource.com"
        );
    }

    #[test]
    fn test_parse_authorized_reply() {
        let body = r#"{
            "id": "7164152486456583603955",
            "submitTimeUtc": "2024-05-01T12:30:00Z",
            "status": "AUTHORIZED",
            "processorInformation": {"transactionId": "558196000003814"},
            "tokenInformation": {
                "instrumentIdentifier": {"id": "7010000000016241111"},
                "paymentInstrument": {"id": "F0E3D4D5A6B7C8D9"}
            }
        }"#;

        let reply = parse_payment_reply(StatusCode::CREATED, body).unwrap();
        let PaymentReply::Transaction(envelope) = reply else {
            panic!("expected a transaction");
        };
        assert_eq!(envelope.id, "7164152486456583603955");
        assert_eq!(envelope.status, "AUTHORIZED");
        assert_eq!(envelope.processor_transaction_id.as_deref(), Some("558196000003814"));
        assert_eq!(envelope.instrument_identifier_id.as_deref(), Some("7010000000016241111"));
        assert_eq!(envelope.payment_instrument_id.as_deref(), Some("F0E3D4D5A6B7C8D9"));
    }

    #[test]
    fn test_parse_invalid_request_with_transaction_id() {
        let body = r#"{"id":"1","status":"INVALID_REQUEST","reason":"MISSING_FIELD","message":"Declined - The request is missing one or more fields"}"#;
        let reply = parse_payment_reply(StatusCode::BAD_REQUEST, body).unwrap();
        assert!(matches!(reply, PaymentReply::Transaction(ref e) if e.status == "INVALID_REQUEST"));
    }

    #[test]
    fn test_parse_refusal_and_malformed_replies() {
        let reply = parse_payment_reply(
            StatusCode::UNAUTHORIZED,
            r#"{"response":{"rmsg":"Authentication Failed"},"message":"Authentication Failed"}"#,
        )
        .unwrap();
        assert_eq!(
            reply,
            PaymentReply::Failure {
                message: "Authentication Failed".to_string()
            }
        );

        let reply = parse_payment_reply(StatusCode::FORBIDDEN, "").unwrap();
        assert_eq!(
            reply,
            PaymentReply::Failure {
                message: "Gateway returned HTTP 403".to_string()
            }
        );

        let result = parse_payment_reply(StatusCode::CREATED, r#"{"status":"AUTHORIZED"}"#);
        assert!(matches!(result, Err(GatewayError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_http_client_applies_configured_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = build_http_client(Duration::from_millis(100));
        let err = client
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_create_payment_signs_request() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", PAYMENTS_PATH)
            .match_header("v-c-merchant-id", "donations_test")
            .match_header("digest", mockito::Matcher::Regex(r"^SHA-256=".into()))
            .match_header(
                "signature",
                mockito::Matcher::Regex(r#"keyid="key-1", algorithm="HmacSHA256""#.into()),
            )
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"orderInformation":{"amountDetails":{"totalAmount":"25.00","currency":"USD"}}}"#
                    .to_string(),
            ))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"pay_1","status":"AUTHORIZED","submitTimeUtc":"2024-05-01T12:30:00Z"}"#)
            .create_async()
            .await;

        let client = client_for(server.url());
        let reply = client
            .create_payment(GatewayEnvironment::Development, &request())
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(matches!(reply, PaymentReply::Transaction(ref e) if e.id == "pay_1"));
    }

    #[tokio::test]
    async fn test_environment_selects_base_url() {
        let mut sandbox = mockito::Server::new_async().await;
        let mut production = mockito::Server::new_async().await;

        let sandbox_mock = sandbox
            .mock("POST", PAYMENTS_PATH)
            .expect(0)
            .create_async()
            .await;
        let production_mock = production
            .mock("POST", PAYMENTS_PATH)
            .with_status(201)
            .with_body(r#"{"id":"pay_live","status":"AUTHORIZED"}"#)
            .create_async()
            .await;

        let client = CybersourceClient::with_circuit_breaker(
            credentials(),
            sandbox.url(),
            production.url(),
            Duration::from_secs(5),
            3,
            1,
        );
        client
            .create_payment(GatewayEnvironment::Production, &request())
            .await
            .unwrap();

        sandbox_mock.assert_async().await;
        production_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", PAYMENTS_PATH)
            .with_status(500)
            .expect_at_least(3)
            .create_async()
            .await;

        let client = client_for(server.url());

        // Make 3 failing requests to trip the circuit breaker
        for _ in 0..3 {
            let _ = client
                .create_payment(GatewayEnvironment::Development, &request())
                .await;
        }

        let result = client
            .create_payment(GatewayEnvironment::Development, &request())
            .await;
        assert!(matches!(result, Err(GatewayError::CircuitBreakerOpen(_))));
    }

    #[tokio::test]
    async fn test_unready_client_refuses_to_call() {
        let client = CybersourceClient::new(CybersourceCredentials::default(), Duration::from_secs(5));
        let result = client
            .create_payment(GatewayEnvironment::Development, &request())
            .await;
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }
}
