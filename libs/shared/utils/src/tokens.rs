use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Purpose string for patient-facing magic links. The first-access and
/// reschedule links share it; a reschedule payload is distinguished by
/// carrying a `reservation_id`.
pub const RESERVATION_FORM_PURPOSE: &str = "reservation-form";

/// Purpose string for the staff session cookie.
pub const STAFF_SESSION_PURPOSE: &str = "staff-session";

pub const FORM_TOKEN_MAX_AGE_SECS: i64 = 60 * 60;
pub const RESCHEDULE_TOKEN_MAX_AGE_SECS: i64 = 48 * 60 * 60;
pub const STAFF_SESSION_MAX_AGE_SECS: i64 = 12 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Bad structure, bad encoding, or a signature that does not verify.
    Invalid,
    /// The signature verified but the token is older than the allowed age.
    Expired,
}

/// Derive a signing key scoped to one purpose, so a token issued for one
/// action class can never verify under another.
fn purpose_key(secret: &str, purpose: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(purpose.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn sign(secret: &str, purpose: &str, body: &str) -> Vec<u8> {
    let key = purpose_key(secret, purpose);
    let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC can take key of any size");
    mac.update(body.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

pub(crate) fn issue_token_at(
    secret: &str,
    purpose: &str,
    payload: Map<String, Value>,
    iat: i64,
) -> String {
    let envelope = json!({
        "iat": iat,
        "data": payload,
    });
    let body = URL_SAFE_NO_PAD.encode(envelope.to_string());
    let signature = URL_SAFE_NO_PAD.encode(sign(secret, purpose, &body));
    format!("{}.{}", body, signature)
}

/// Serialize `payload` together with the issuance time and sign it under the
/// purpose-scoped key. The result is opaque and safe for URL embedding.
pub fn issue_token(secret: &str, purpose: &str, payload: Map<String, Value>) -> String {
    issue_token_at(secret, purpose, payload, Utc::now().timestamp())
}

/// Verify a token and return its payload.
///
/// The signature check runs before, and independently of, the age check: a
/// forged token reports `Invalid` even when its embedded timestamp would also
/// have been stale.
pub fn verify_token(
    secret: &str,
    purpose: &str,
    token: &str,
    max_age_secs: i64,
) -> Result<Map<String, Value>, TokenError> {
    let Some((body, signature_b64)) = token.split_once('.') else {
        return Err(TokenError::Invalid);
    };

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::Invalid)?;

    let key = purpose_key(secret, purpose);
    let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC can take key of any size");
    mac.update(body.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        debug!("token signature verification failed");
        return Err(TokenError::Invalid);
    }

    let envelope_bytes = URL_SAFE_NO_PAD.decode(body).map_err(|_| TokenError::Invalid)?;
    let envelope: Value =
        serde_json::from_slice(&envelope_bytes).map_err(|_| TokenError::Invalid)?;

    let iat = envelope
        .get("iat")
        .and_then(Value::as_i64)
        .ok_or(TokenError::Invalid)?;
    let Some(Value::Object(data)) = envelope.get("data") else {
        return Err(TokenError::Invalid);
    };

    let age = Utc::now().timestamp() - iat;
    if age > max_age_secs {
        debug!("token expired: age {}s exceeds {}s", age, max_age_secs);
        return Err(TokenError::Expired);
    }

    Ok(data.clone())
}
