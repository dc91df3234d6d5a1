use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::handle::{base_candidate, choose_handle};
use super::principal::{Role, RoleSet};
use super::token::TokenIssuer;
use super::validate::{check_email, check_phone, check_username, strip_email, strip_phone, strip_username};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::security::SecretHasher;
use crate::signing::ContentSigner;
use crate::storage::{Identity, IdentityIndex, Store};
use crate::tprintln;

pub const ALREADY_EXISTS: &str = "User already exists. Reset password?";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub is_listed: bool,
}

/// `type` is `username`, `email` or `phone`; when absent it is inferred in that order from the
/// first non-empty identifier field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default, rename = "type")]
    pub identifier_type: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierType {
    Username,
    Email,
    Phone,
}

/// Projection safe for anyone to see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicIdentity {
    pub id: Uuid,
    pub username: String,
    pub username_with_local_part: String,
    pub profile: Value,
    pub public_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Projection for the identity itself (and elevated principals). Never includes the secret hash or
/// the sealed private key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivateIdentity {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub username: String,
    pub username_with_local_part: String,
    pub roles: RoleSet,
    pub profile: Value,
    pub public_key: Option<String>,
    pub is_listed: bool,
    pub created_at: DateTime<Utc>,
}

pub fn username_with_local_part(handle: &str, domain: &str) -> String {
    format!("@{}:{}", domain, handle)
}

impl PublicIdentity {
    pub fn from_identity(i: &Identity, domain: &str) -> Self {
        Self {
            id: i.id,
            username: i.handle.clone(),
            username_with_local_part: username_with_local_part(&i.handle, domain),
            profile: i.profile.clone(),
            public_key: i.keypair.as_ref().map(|k| k.public_key.clone()),
            created_at: i.created_at,
        }
    }
}

impl PrivateIdentity {
    pub fn from_identity(i: &Identity, domain: &str) -> Self {
        Self {
            id: i.id,
            name: i.name.clone(),
            email: i.email.clone(),
            phone: i.phone.clone(),
            username: i.handle.clone(),
            username_with_local_part: username_with_local_part(&i.handle, domain),
            roles: i.roles.clone(),
            profile: i.profile.clone(),
            public_key: i.keypair.as_ref().map(|k| k.public_key.clone()),
            is_listed: i.is_listed,
            created_at: i.created_at,
        }
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Signup and login. Calls are CPU heavy (password hashing); async callers run them on the blocking pool.
pub struct CredentialIssuer {
    store: Arc<dyn Store>,
    hasher: SecretHasher,
    tokens: TokenIssuer,
    signer: ContentSigner,
    min_secret_len: usize,
    handle_budget: Duration,
    domain: String,
    /// Verified against when the identifier is unknown so both failure paths cost one hash check.
    dummy_digest: String,
}

impl CredentialIssuer {
    pub fn new(cfg: &Config, store: Arc<dyn Store>, hasher: SecretHasher, tokens: TokenIssuer, signer: ContentSigner) -> anyhow::Result<Self> {
        let dummy_digest = hasher.hash(&Uuid::new_v4().to_string())?;
        Ok(Self {
            store,
            hasher,
            tokens,
            signer,
            min_secret_len: cfg.min_secret_len.max(1),
            handle_budget: cfg.handle_search_budget,
            domain: cfg.domain.clone(),
            dummy_digest,
        })
    }

    pub fn domain(&self) -> &str { &self.domain }

    pub fn signup(&self, req: SignupRequest) -> AppResult<PrivateIdentity> {
        let username = non_empty(&req.username).map(strip_username);
        let email = non_empty(&req.email).map(strip_email);
        let phone = non_empty(&req.phone).map(strip_phone);
        let name = non_empty(&req.name).map(str::to_string);

        if let Some(u) = &username { check_username(u)?; }
        if let Some(e) = &email { check_email(e)?; }
        if let Some(p) = &phone { check_phone(p)?; }
        if email.is_none() && phone.is_none() {
            return Err(AppError::user("contact_required", "Email or phone is required."));
        }
        if req.password.chars().count() < self.min_secret_len {
            return Err(AppError::user(
                "weak_password",
                format!("Password must be at least {} characters.", self.min_secret_len),
            ));
        }

        let index = self.store.identity_index();
        let email_taken = email.as_deref().is_some_and(|e| index.by_email(e).is_some());
        let phone_taken = phone.as_deref().is_some_and(|p| index.by_phone(p).is_some());
        if email_taken || phone_taken {
            tracing::info!(target: "auth", "signup rejected: contact already registered");
            return Err(AppError::conflict("identity_exists", ALREADY_EXISTS));
        }

        let id = Uuid::new_v4();
        let handle = match username {
            Some(u) => {
                if index.handle_taken(&u) {
                    return Err(AppError::conflict("identity_exists", ALREADY_EXISTS));
                }
                u
            }
            None => {
                let choice = choose_handle(&base_candidate(name.as_deref()), |h| index.handle_taken(h), id, self.handle_budget);
                if choice.fell_back {
                    tracing::warn!(target: "auth", attempts = choice.attempts, "handle search exhausted; using id-derived handle");
                }
                choice.handle
            }
        };

        let secret_hash = self
            .hasher
            .hash(&req.password)
            .map_err(|e| AppError::internal("hash_failed", e.to_string()))?;

        let contact = email.clone().or_else(|| phone.clone()).unwrap_or_default();
        let keypair = match self.signer.provision(name.as_deref().unwrap_or(&handle), &contact) {
            Ok(kp) => Some(kp),
            Err(e) => {
                // identity is still created, just without signing capability
                tracing::warn!(target: "signing", identity = %id, error = %e, "keypair provisioning failed");
                None
            }
        };

        let now = Utc::now();
        let identity = Identity {
            id,
            name,
            handle,
            email,
            phone,
            secret_hash,
            roles: RoleSet::single(Role::Member),
            keypair,
            profile: Value::Object(Default::default()),
            is_listed: req.is_listed,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let stored = index.insert_unique(identity).map_err(|field| {
            tracing::info!(target: "auth", ?field, "signup lost a uniqueness race");
            AppError::conflict("identity_exists", ALREADY_EXISTS)
        })?;
        tracing::info!(target: "auth", identity = %stored.id, handle = %stored.handle, signed = stored.keypair.is_some(), "identity created");
        Ok(PrivateIdentity::from_identity(&stored, &self.domain))
    }

    fn resolve_identifier(req: &LoginRequest) -> AppResult<(IdentifierType, String)> {
        let kind = match req.identifier_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(t) => match t.to_ascii_lowercase().as_str() {
                "username" => IdentifierType::Username,
                "email" => IdentifierType::Email,
                "phone" => IdentifierType::Phone,
                _ => return Err(AppError::user("invalid_login_type", "Invalid login type. Valid: username, email, phone.")),
            },
            None if non_empty(&req.username).is_some() => IdentifierType::Username,
            None if non_empty(&req.email).is_some() => IdentifierType::Email,
            None if non_empty(&req.phone).is_some() => IdentifierType::Phone,
            None => return Err(AppError::user("identifier_required", "Username, email or phone is required.")),
        };
        let value = match kind {
            IdentifierType::Username => {
                let v = strip_username(non_empty(&req.username).unwrap_or_default());
                check_username(&v)?;
                v
            }
            IdentifierType::Email => {
                let v = strip_email(non_empty(&req.email).unwrap_or_default());
                check_email(&v)?;
                v
            }
            IdentifierType::Phone => {
                let v = strip_phone(non_empty(&req.phone).unwrap_or_default());
                check_phone(&v)?;
                v
            }
        };
        Ok((kind, value))
    }

    pub fn login(&self, req: LoginRequest) -> AppResult<IssuedToken> {
        let (kind, value) = Self::resolve_identifier(&req)?;
        let index = self.store.identity_index();
        let found = match kind {
            IdentifierType::Username => index.by_handle(&value),
            IdentifierType::Email => index.by_email(&value),
            IdentifierType::Phone => index.by_phone(&value),
        };
        let identity = match found {
            Some(i) if !i.is_deleted() => i,
            _ => {
                let _ = self.hasher.verify(&req.password, &self.dummy_digest);
                tprintln!("auth.login unknown identifier kind={:?}", kind);
                tracing::info!(target: "auth", ?kind, "login failed");
                return Err(AppError::invalid_credentials());
            }
        };
        if !self.hasher.verify(&req.password, &identity.secret_hash) {
            tracing::info!(target: "auth", ?kind, "login failed");
            return Err(AppError::invalid_credentials());
        }
        let iat = Utc::now().timestamp();
        let token = self.tokens.issue_at(identity.id, &identity.roles, iat)?;
        tracing::info!(target: "auth", identity = %identity.id, "login succeeded");
        Ok(IssuedToken { token, expires_at: self.tokens.expiry_for(iat) })
    }
}
