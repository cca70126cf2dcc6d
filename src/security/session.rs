//! Session authentication.
//!
//! # Responsibilities
//! - Extract a session credential from one of the accepted carriers
//! - Verify signature and expiry, nothing else (business-state checks
//!   belong to the access gate)
//!
//! # Design Decisions
//! - Carriers are an ordered strategy list tried in priority order; the
//!   first credential found is authoritative, so a bad token in the
//!   current cookie is never rescued by a legacy one
//! - Malformed and expired tokens are indistinguishable to callers;
//!   the debug log keeps the distinction

use axum::http::header::{HeaderMap, AUTHORIZATION, COOKIE};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::schema::SessionConfig;

/// Audience claim stamped into merchant session tokens.
pub const SESSION_AUDIENCE: &str = "merchant";

/// Error type for session authentication. Both variants resolve to the
/// same caller-visible outcome (redirect or 401); they differ only for
/// logging.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no session credential present")]
    Missing,

    #[error("session credential rejected")]
    Invalid,
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Caller (user) identifier.
    pub sub: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
    /// Server-side session row id, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

/// An authenticated caller, attached to the request as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub session_id: Option<String>,
    pub expires_at: usize,
}

/// Read a cookie value out of the Cookie header(s).
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get_all(COOKIE).iter().find_map(|header| {
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (k, v) = pair.trim().split_once('=')?;
            (k == name).then(|| v.to_string())
        })
    })
}

/// One way a session credential can be carried on a request.
trait CredentialSource: Send + Sync {
    /// Carrier name for logs.
    fn name(&self) -> &'static str;

    /// Pull the raw token out of the request headers, if carried here.
    fn extract(&self, headers: &HeaderMap) -> Option<String>;
}

/// Session token in a named cookie.
struct SessionCookie {
    cookie_name: String,
}

impl CredentialSource for SessionCookie {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn extract(&self, headers: &HeaderMap) -> Option<String> {
        cookie_value(headers, &self.cookie_name)
    }
}

/// Session token in an Authorization: Bearer header (API clients).
struct BearerToken;

impl CredentialSource for BearerToken {
    fn name(&self) -> &'static str {
        "bearer"
    }

    fn extract(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        value.strip_prefix("Bearer ").map(|t| t.to_string())
    }
}

/// Validates session credentials attached to inbound requests.
pub struct SessionAuthenticator {
    sources: Vec<Box<dyn CredentialSource>>,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionAuthenticator {
    pub fn new(config: &SessionConfig) -> Self {
        // Priority order: current cookie, then the legacy cookie still
        // accepted during the scheme migration, then bearer tokens.
        let sources: Vec<Box<dyn CredentialSource>> = vec![
            Box::new(SessionCookie {
                cookie_name: config.cookie_name.clone(),
            }),
            Box::new(SessionCookie {
                cookie_name: config.legacy_cookie_name.clone(),
            }),
            Box::new(BearerToken),
        ];

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[SESSION_AUDIENCE]);
        validation.leeway = 0;

        Self {
            sources,
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Authenticate a request from its headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        let (source, token) = self
            .sources
            .iter()
            .find_map(|s| s.extract(headers).map(|t| (s.name(), t)))
            .ok_or(SessionError::Missing)?;

        match decode::<SessionClaims>(&token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(Session {
                user_id: data.claims.sub,
                session_id: data.claims.sid,
                expires_at: data.claims.exp,
            }),
            Err(e) => {
                tracing::debug!(carrier = source, error = %e, "Session token rejected");
                Err(SessionError::Invalid)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "unit-test-secret";

    fn authenticator() -> SessionAuthenticator {
        SessionAuthenticator::new(&SessionConfig {
            secret: SECRET.to_string(),
            ..SessionConfig::default()
        })
    }

    fn token(sub: &str, exp_offset_secs: i64) -> String {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let claims = SessionClaims {
            sub: sub.to_string(),
            aud: SESSION_AUDIENCE.to_string(),
            iat: now as usize,
            exp: (now + exp_offset_secs).max(0) as usize,
            sid: Some("sess_1".to_string()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes()))
            .expect("token encodes")
    }

    fn headers_with_cookie(raw: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(raw).unwrap());
        headers
    }

    #[test]
    fn cookie_value_parses_multi_pair_header() {
        let headers = headers_with_cookie("a=1; vayva_session=tok; b=2");
        assert_eq!(cookie_value(&headers, "vayva_session").as_deref(), Some("tok"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn valid_cookie_session_is_accepted() {
        let headers = headers_with_cookie(&format!("vayva_session={}", token("usr_1", 3600)));
        let session = authenticator().authenticate(&headers).unwrap();
        assert_eq!(session.user_id, "usr_1");
        assert_eq!(session.session_id.as_deref(), Some("sess_1"));
    }

    #[test]
    fn legacy_cookie_is_accepted_when_current_is_absent() {
        let headers = headers_with_cookie(&format!("vayva_token={}", token("usr_2", 3600)));
        let session = authenticator().authenticate(&headers).unwrap();
        assert_eq!(session.user_id, "usr_2");
    }

    #[test]
    fn current_cookie_is_authoritative_over_legacy() {
        // A garbage current cookie must not fall through to the legacy
        // one: first carrier found wins.
        let headers = headers_with_cookie(&format!(
            "vayva_session=garbage; vayva_token={}",
            token("usr_3", 3600)
        ));
        assert_eq!(
            authenticator().authenticate(&headers),
            Err(SessionError::Invalid)
        );
    }

    #[test]
    fn bearer_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token("usr_4", 3600))).unwrap(),
        );
        let session = authenticator().authenticate(&headers).unwrap();
        assert_eq!(session.user_id, "usr_4");
    }

    #[test]
    fn missing_credential_is_distinguished_from_invalid() {
        assert_eq!(
            authenticator().authenticate(&HeaderMap::new()),
            Err(SessionError::Missing)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let headers = headers_with_cookie(&format!("vayva_session={}", token("usr_5", -60)));
        assert_eq!(
            authenticator().authenticate(&headers),
            Err(SessionError::Invalid)
        );
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let other = SessionConfig {
            secret: "a-different-secret".to_string(),
            ..SessionConfig::default()
        };
        let foreign = SessionAuthenticator::new(&other);
        let headers = headers_with_cookie(&format!("vayva_session={}", token("usr_6", 3600)));
        assert_eq!(foreign.authenticate(&headers), Err(SessionError::Invalid));
    }
}
