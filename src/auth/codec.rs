//! Signed session credential codec.
//!
//! Credentials use the compact JWS layout with an HS256 tag:
//!
//! ```text
//! base64url({"alg":"HS256","typ":"JWT"}) . base64url(claims) . base64url(HMAC-SHA256)
//! ```
//!
//! Decoding checks structure first, then expiry, then the tag. An expired
//! credential is reported as expired whether or not its tag verifies; it is
//! rejected either way.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::auth::claims::SessionClaims;
use crate::clock::UnixSeconds;
use crate::error::{GateError, InvalidReason};

type HmacSha256 = Hmac<Sha256>;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const ALGORITHM: &str = "HS256";

/// Shared HMAC key. `Debug` never prints the key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(Arc<[u8]>);

impl SessionSecret {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(bytes.as_ref()))
    }

    /// Random key for development runs without a configured secret.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 48];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionSecret(<{} bytes redacted>)", self.0.len())
    }
}

/// Reasons a credential failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("credential is malformed")]
    Malformed,
    #[error("credential signature does not match")]
    SignatureInvalid,
    #[error("credential has expired")]
    Expired,
}

impl From<DecodeError> for GateError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Malformed => GateError::InvalidSession(InvalidReason::Malformed),
            DecodeError::SignatureInvalid => {
                GateError::InvalidSession(InvalidReason::SignatureInvalid)
            }
            DecodeError::Expired => GateError::SessionExpired,
        }
    }
}

/// Failure while producing a credential.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to serialize claims: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid signing key")]
    Key,
}

impl From<EncodeError> for GateError {
    fn from(e: EncodeError) -> Self {
        GateError::Internal(e.to_string())
    }
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Sign claims into an opaque credential string.
///
/// Output is deterministic for the same claims and secret.
pub fn encode(claims: &SessionClaims, secret: &SessionSecret) -> Result<String, EncodeError> {
    let header_b64 = URL_SAFE_NO_PAD.encode(HEADER_JSON.as_bytes());
    let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{}.{}", header_b64, payload_b64);

    let tag = sign(signing_input.as_bytes(), secret)?;
    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(tag)))
}

/// Verify a credential and return its claims.
pub fn decode(
    credential: &str,
    secret: &SessionSecret,
    now: UnixSeconds,
) -> Result<SessionClaims, DecodeError> {
    let mut segments = credential.split('.');
    let (header_b64, payload_b64, tag_b64) =
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(h), Some(p), Some(t), None) if !h.is_empty() && !p.is_empty() => (h, p, t),
            _ => return Err(DecodeError::Malformed),
        };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| DecodeError::Malformed)?;
    let header: Header =
        serde_json::from_slice(&header_bytes).map_err(|_| DecodeError::Malformed)?;
    if header.alg != ALGORITHM {
        return Err(DecodeError::Malformed);
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| DecodeError::Malformed)?;
    let claims: SessionClaims =
        serde_json::from_slice(&payload_bytes).map_err(|_| DecodeError::Malformed)?;
    if claims.exp <= claims.iat {
        return Err(DecodeError::Malformed);
    }

    if now >= claims.exp {
        return Err(DecodeError::Expired);
    }

    // An undecodable tag cannot match any key: report it as a bad signature.
    let presented = URL_SAFE_NO_PAD
        .decode(tag_b64)
        .map_err(|_| DecodeError::SignatureInvalid)?;
    let signing_input_len = header_b64.len() + 1 + payload_b64.len();
    let expected = sign(credential[..signing_input_len].as_bytes(), secret)
        .map_err(|_| DecodeError::SignatureInvalid)?;

    if bool::from(expected.as_slice().ct_eq(presented.as_slice())) {
        Ok(claims)
    } else {
        Err(DecodeError::SignatureInvalid)
    }
}

fn sign(input: &[u8], secret: &SessionSecret) -> Result<Vec<u8>, EncodeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| EncodeError::Key)?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().to_vec())
}
