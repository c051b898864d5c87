//! Authentication contract for the cloud service.
//!
//! Login checks an identity/secret pair against the fixed credential table
//! with a constant-time comparison and issues an HS256 token binding the
//! identity with a 24-hour expiry. Every protected route runs the bearer
//! middleware first: it verifies signature and expiry, injects the caller
//! identity into request extensions, and short-circuits with 401 on any
//! verification failure.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::CloudState;

// ---

/// JWT claims: the bound identity and the expiry instant (unix seconds).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    // ---
    pub sub: String,
    pub exp: i64,
}

/// Authenticated caller identity, inserted into request extensions by the
/// bearer middleware and read back by handlers.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub String);

/// Issues and verifies signed access tokens against a fixed credential table.
pub struct Authenticator {
    // ---
    encoding: EncodingKey,
    decoding: DecodingKey,
    credentials: Vec<(String, String)>,
    token_ttl: Duration,
}

impl Authenticator {
    pub fn new(signing_secret: &str, credentials: Vec<(String, String)>, token_ttl: Duration) -> Self {
        // ---
        Self {
            encoding: EncodingKey::from_secret(signing_secret.as_bytes()),
            decoding: DecodingKey::from_secret(signing_secret.as_bytes()),
            credentials,
            token_ttl,
        }
    }

    /// Check the identity/secret pair and issue a fresh token on a match.
    pub fn login(&self, identity: &str, secret: &str) -> Result<String, ApiError> {
        // ---
        let known = self
            .credentials
            .iter()
            .find(|(name, _)| name == identity)
            .ok_or(ApiError::InvalidCredentials)?;

        if !constant_time_eq(known.1.as_bytes(), secret.as_bytes()) {
            warn!(identity, "rejected login");
            return Err(ApiError::InvalidCredentials);
        }

        let claims = Claims {
            sub: identity.to_string(),
            exp: (Utc::now() + self.token_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            warn!("token encoding failed: {e}");
            ApiError::Internal
        })
    }

    /// Verify signature and expiry; yields the bound identity.
    pub fn authenticate(&self, token: &str) -> Result<String, ApiError> {
        // ---
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| ApiError::InvalidOrExpiredToken)?;

        Ok(data.claims.sub)
    }
}

// ---

/// Bearer-token interceptor composed onto every protected route.
///
/// Runs `authenticate` before the handler and rejects with 401 on any
/// failure, so no handler observes an unauthenticated request.
pub async fn require_auth(
    State(state): State<Arc<CloudState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // ---
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    let token = header.strip_prefix("Bearer ").unwrap_or(header);
    let identity = state.auth().authenticate(token)?;

    debug!(identity = %identity, "authenticated request");
    req.extensions_mut().insert(CallerIdentity(identity));
    Ok(next.run(req).await)
}

/// Decode an HTTP Basic `Authorization` header into (identity, secret).
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    // ---
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (identity, secret) = text.split_once(':')?;
    Some((identity.to_string(), secret.to_string()))
}

/// Byte-wise comparison without an early exit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    // ---
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn test_authenticator(ttl: Duration) -> Authenticator {
        // ---
        Authenticator::new(
            "unit-test-secret",
            vec![
                ("fog_node".to_string(), "fog-pass".to_string()),
                ("admin".to_string(), "admin-pass".to_string()),
            ],
            ttl,
        )
    }

    #[test]
    fn test_login_roundtrip_binds_identity() {
        // ---
        let auth = test_authenticator(Duration::hours(24));

        let token = auth.login("fog_node", "fog-pass").unwrap();
        let identity = auth.authenticate(&token).unwrap();
        assert_eq!(identity, "fog_node");
    }

    #[test]
    fn test_login_rejects_bad_secret_and_unknown_identity() {
        // ---
        let auth = test_authenticator(Duration::hours(24));

        assert!(matches!(
            auth.login("fog_node", "wrong"),
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "fog-pass"),
            Err(ApiError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        // ---
        let auth = test_authenticator(Duration::hours(-1));

        let token = auth.login("admin", "admin-pass").unwrap();
        assert!(matches!(
            auth.authenticate(&token),
            Err(ApiError::InvalidOrExpiredToken)
        ));
    }

    #[test]
    fn test_malformed_and_wrong_key_tokens_rejected() {
        // ---
        let auth = test_authenticator(Duration::hours(24));
        assert!(auth.authenticate("not-a-jwt").is_err());

        let other = Authenticator::new(
            "some-other-secret",
            vec![("fog_node".to_string(), "fog-pass".to_string())],
            Duration::hours(24),
        );
        let forged = other.login("fog_node", "fog-pass").unwrap();
        assert!(matches!(
            auth.authenticate(&forged),
            Err(ApiError::InvalidOrExpiredToken)
        ));
    }

    #[test]
    fn test_parse_basic_auth() {
        // ---
        // "fog_node:fog-pass"
        let header = format!("Basic {}", BASE64.encode("fog_node:fog-pass"));
        assert_eq!(
            parse_basic_auth(&header),
            Some(("fog_node".to_string(), "fog-pass".to_string()))
        );

        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic !!!"), None);
    }

    #[test]
    fn test_constant_time_eq() {
        // ---
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secr"));
        assert!(constant_time_eq(b"", b""));
    }
}
