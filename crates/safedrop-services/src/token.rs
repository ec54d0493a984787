//! Stateless, time-limited download tokens.
//!
//! Token = base64url("{subject_id}:{issued_at}:{lifetime_secs}:{hex_mac}") where
//! `hex_mac` is HMAC-SHA256(secret, "{subject_id}:{issued_at}:{lifetime_secs}").
//! Validity depends only on the secret and the current time.

use base64::Engine;
use hmac::{Hmac, Mac};
use safedrop_core::config::MIN_TOKEN_SECRET_LEN;
use safedrop_core::Clock;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenConfigError {
    #[error("token secret is not configured")]
    MissingSecret,

    #[error("token secret must be at least {min} bytes (got {len})")]
    SecretTooShort { len: usize, min: usize },
}

#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    default_lifetime_secs: u64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &"<redacted>")
            .field("default_lifetime_secs", &self.default_lifetime_secs)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(
        secret: &[u8],
        default_lifetime_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenConfigError> {
        if secret.is_empty() {
            return Err(TokenConfigError::MissingSecret);
        }
        if secret.len() < MIN_TOKEN_SECRET_LEN {
            return Err(TokenConfigError::SecretTooShort {
                len: secret.len(),
                min: MIN_TOKEN_SECRET_LEN,
            });
        }
        Ok(Self {
            secret: secret.to_vec(),
            default_lifetime_secs,
            clock,
        })
    }

    pub fn default_lifetime_secs(&self) -> u64 {
        self.default_lifetime_secs
    }

    fn mac_hex(&self, payload: &str) -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Mint a token for `subject_id` with the default lifetime.
    pub fn generate(&self, subject_id: u64) -> String {
        self.generate_with_lifetime(subject_id, self.default_lifetime_secs)
    }

    pub fn generate_with_lifetime(&self, subject_id: u64, lifetime_secs: u64) -> String {
        let issued_at = self.clock.now_secs();
        let payload = format!("{}:{}:{}", subject_id, issued_at, lifetime_secs);
        let mac = self.mac_hex(&payload);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(format!("{}:{}", payload, mac))
    }

    /// Subject id carried by a valid, unexpired token.
    ///
    /// Every failure (encoding, shape, MAC, expiry) yields `None`.
    pub fn validate(&self, token: &str) -> Option<u64> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token.trim())
            .ok()?;
        let decoded = String::from_utf8(decoded).ok()?;

        let fields: Vec<&str> = decoded.split(':').collect();
        let [subject, issued_at, lifetime, mac] = fields.as_slice() else {
            return None;
        };

        let subject_id = parse_decimal(subject)?;
        let issued_at_secs = parse_decimal(issued_at)?;
        let lifetime_secs = parse_decimal(lifetime)?;

        let expected = self.mac_hex(&format!("{}:{}:{}", subject, issued_at, lifetime));
        if !bool::from(expected.as_bytes().ct_eq(mac.as_bytes())) {
            return None;
        }

        if self.clock.now_secs().saturating_sub(issued_at_secs) >= lifetime_secs {
            return None;
        }

        Some(subject_id)
    }
}

/// Non-negative decimal integer. No sign, whitespace or leading `+`.
fn parse_decimal(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
