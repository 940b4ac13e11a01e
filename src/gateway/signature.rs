//! HTTP signature authentication for the CyberSource REST API.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::GatewayError;

type HmacSha256 = Hmac<Sha256>;

/// Headers covered by the signature, in signing order.
pub const SIGNED_HEADERS: &str = "host date request-target digest v-c-merchant-id";

#[derive(Debug, Clone)]
pub struct SigningKey<'a> {
    pub merchant_id: &'a str,
    pub key_id: &'a str,
    /// Base64-encoded shared secret as issued by the gateway.
    pub shared_secret: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub digest: String,
    pub signature: String,
}

pub fn body_digest(body: &[u8]) -> String {
    format!("SHA-256={}", STANDARD.encode(Sha256::digest(body)))
}

pub fn sign(
    key: &SigningKey<'_>,
    host: &str,
    date: &str,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<SignedHeaders, GatewayError> {
    let digest = body_digest(body);
    let signing_string = format!(
        "host: {}\ndate: {}\nrequest-target: {} {}\ndigest: {}\nv-c-merchant-id: {}",
        host,
        date,
        method.to_ascii_lowercase(),
        path,
        digest,
        key.merchant_id
    );

    let secret = STANDARD
        .decode(key.shared_secret)
        .map_err(|_| GatewayError::Configuration("shared secret is not valid base64".to_string()))?;
    let mut mac = HmacSha256::new_from_slice(&secret)
        .map_err(|_| GatewayError::Configuration("shared secret is unusable".to_string()))?;
    mac.update(signing_string.as_bytes());
    let signed = STANDARD.encode(mac.finalize().into_bytes());

    Ok(SignedHeaders {
        digest,
        signature: format!(
            "keyid=\"{}\", algorithm=\"HmacSHA256\", headers=\"{}\", signature=\"{}\"",
            key.key_id, SIGNED_HEADERS, signed
        ),
    })
}
