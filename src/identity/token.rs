//! Signed bearer tokens.
//!
//! Format: `base64url(header) . base64url(claims) . base64url(HMAC-SHA256(secret, header.claims))`,
//! no padding, header fixed to `{"alg":"HS256","typ":"JWT"}`. Tokens are never stored server-side.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use std::time::Duration;
use uuid::Uuid;

use super::principal::{Principal, RoleSet};
use crate::config::Secret;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub roles: RoleSet,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

fn mac_for(secret: &Secret, signing_input: &str) -> AppResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::internal("token_key", format!("invalid token key: {}", e)))?;
    mac.update(signing_input.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Issues tokens for authenticated identities.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    secret: Secret,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: Secret, ttl: Duration) -> Self { Self { secret, ttl } }

    pub fn ttl(&self) -> Duration { self.ttl }

    /// Lifetime in whole seconds, pinned to `i64::MAX` for durations past the timestamp range.
    pub fn ttl_secs(&self) -> i64 { i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX) }

    pub fn expiry_for(&self, iat: i64) -> i64 { iat.saturating_add(self.ttl_secs()) }

    pub fn issue(&self, identity_id: Uuid, roles: &RoleSet) -> AppResult<String> {
        let iat = chrono::Utc::now().timestamp();
        self.issue_at(identity_id, roles, iat)
    }

    /// Issue with an explicit `iat` (seconds since epoch). `exp = iat + ttl`.
    pub fn issue_at(&self, identity_id: Uuid, roles: &RoleSet, iat: i64) -> AppResult<String> {
        let claims = Claims {
            sub: identity_id.to_string(),
            roles: roles.clone(),
            iat,
            exp: self.expiry_for(iat),
        };
        let claims_json = serde_json::to_vec(&claims)
            .map_err(|e| AppError::internal("token_encode", e.to_string()))?;
        let signing_input = format!("{}.{}", URL_SAFE_NO_PAD.encode(HEADER_JSON), URL_SAFE_NO_PAD.encode(claims_json));
        let mac = mac_for(&self.secret, &signing_input)?;
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(mac)))
    }
}

/// Validates tokens and rebuilds the request principal. Pure computation, no I/O.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    secret: Secret,
}

impl TokenVerifier {
    pub fn new(secret: Secret) -> Self { Self { secret } }

    pub fn verify(&self, raw: &str) -> AppResult<Principal> {
        self.verify_at(raw, chrono::Utc::now().timestamp())
    }

    /// Every failure maps to the same generic authentication error; the reason is only traced.
    pub fn verify_at(&self, raw: &str, now: i64) -> AppResult<Principal> {
        match self.check(raw, now) {
            Ok(p) => Ok(p),
            Err(reason) => {
                tracing::debug!(target: "auth", reason, "token rejected");
                Err(AppError::invalid_token())
            }
        }
    }

    fn check(&self, raw: &str, now: i64) -> Result<Principal, &'static str> {
        let mut parts = raw.trim().split('.');
        let (h, c, m) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(c), Some(m), None) if !h.is_empty() && !c.is_empty() && !m.is_empty() => (h, c, m),
            _ => return Err("malformed"),
        };
        let header_bytes = URL_SAFE_NO_PAD.decode(h).map_err(|_| "header encoding")?;
        let header: Header = serde_json::from_slice(&header_bytes).map_err(|_| "header json")?;
        if header.alg != "HS256" {
            return Err("unsupported alg");
        }
        let presented = URL_SAFE_NO_PAD.decode(m).map_err(|_| "mac encoding")?;
        let signing_input = &raw.trim()[..h.len() + 1 + c.len()];
        let expected = mac_for(&self.secret, signing_input).map_err(|_| "key")?;
        if !bool::from(expected.as_slice().ct_eq(presented.as_slice())) {
            return Err("bad mac");
        }
        let claims_bytes = URL_SAFE_NO_PAD.decode(c).map_err(|_| "claims encoding")?;
        let claims: Claims = serde_json::from_slice(&claims_bytes).map_err(|_| "claims json")?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| "subject")?;
        if now >= claims.exp {
            return Err("expired");
        }
        Ok(Principal::authenticated(id, claims.roles))
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let v = header_value.trim();
    let (scheme, rest) = v.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() { None } else { Some(token) }
}
