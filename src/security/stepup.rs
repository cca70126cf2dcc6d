//! Step-up (PIN) credential management.
//!
//! A step-up credential is a short-lived, separately signed proof that
//! the caller re-verified their PIN recently. It is independent of the
//! long-lived session and is version-fenced: the token carries a
//! snapshot of the tenant's credential version at issuance, so rotating
//! the PIN invalidates every outstanding token immediately, even inside
//! the time window.
//!
//! This manager has no knowledge of why step-up is required; it is a
//! pure credential primitive the access gate composes with the rest of
//! its checks.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::schema::StepUpConfig;

/// Error type for credential issuance. Validation never errors: any
/// failure there is simply "not valid".
#[derive(Debug, thiserror::Error)]
pub enum StepUpError {
    #[error("credential encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Claims carried by a step-up token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StepUpClaims {
    /// Tenant the credential was issued for.
    sub: String,
    /// Tenant credential version at issuance (the fence).
    ver: u32,
    iat: usize,
    exp: usize,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Issues and validates step-up credentials.
pub struct StepUpManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    cookie_name: String,
    ttl_secs: u64,
    secure_cookies: bool,
}

impl StepUpManager {
    pub fn new(config: &StepUpConfig, secure_cookies: bool) -> Self {
        // Expiry is checked against an injected clock in validate_at,
        // not by the decoder, so the fencing properties are testable
        // without sleeping.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            cookie_name: config.cookie_name.clone(),
            ttl_secs: config.ttl_secs,
            secure_cookies,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Issue a signed step-up token for a tenant at its current
    /// credential version.
    pub fn issue(&self, tenant_id: &str, credential_version: u32) -> Result<String, StepUpError> {
        self.issue_at(tenant_id, credential_version, unix_now())
    }

    fn issue_at(
        &self,
        tenant_id: &str,
        credential_version: u32,
        now: u64,
    ) -> Result<String, StepUpError> {
        let claims = StepUpClaims {
            sub: tenant_id.to_string(),
            ver: credential_version,
            iat: now as usize,
            exp: (now + self.ttl_secs) as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Validate a token against a tenant and its current credential
    /// version. Fails closed: any decode or signature error is "not
    /// valid", never an error the caller could mistake for "allowed".
    pub fn validate(&self, token: &str, tenant_id: &str, current_version: u32) -> bool {
        self.validate_at(token, tenant_id, current_version, unix_now())
    }

    fn validate_at(&self, token: &str, tenant_id: &str, current_version: u32, now: u64) -> bool {
        let claims = match decode::<StepUpClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "Step-up token rejected");
                return false;
            }
        };

        if now >= claims.exp as u64 {
            tracing::debug!(tenant = %claims.sub, "Step-up token expired");
            return false;
        }

        // Version fencing: a token minted before a PIN rotation carries
        // a stale version and is dead on arrival.
        claims.sub == tenant_id && claims.ver == current_version
    }

    /// Set-Cookie value carrying a step-up token: HttpOnly, same-site,
    /// site-wide, absolute expiry; Secure everywhere but development.
    pub fn cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.cookie_name, token, self.ttl_secs
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
