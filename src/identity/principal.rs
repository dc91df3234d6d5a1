use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// A role identifier. The well-known roles get their own variants; anything else loaded from
/// the policy source is carried as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Anonymous,
    Member,
    Admin,
    Custom(String),
}

impl Role {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "anonymous" => Role::Anonymous,
            "member" => Role::Member,
            "admin" => Role::Admin,
            _ => Role::Custom(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Anonymous => "anonymous",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Custom(s) => s.as_str(),
        }
    }

    /// Elevated roles bypass ownership checks (never the route policy).
    pub fn is_elevated(&self) -> bool { matches!(self, Role::Admin) }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(self.as_str()) }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        if s.trim().is_empty() {
            return Err(serde::de::Error::custom("empty role"));
        }
        Ok(Role::parse(&s))
    }
}

/// Ordered, duplicate-free set of roles; serialized as a JSON list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self { Self(BTreeSet::new()) }
    pub fn single(role: Role) -> Self { let mut s = Self::new(); s.insert(role); s }
    pub fn insert(&mut self, role: Role) -> bool { self.0.insert(role) }
    pub fn contains(&self, role: &Role) -> bool { self.0.contains(role) }
    pub fn iter(&self) -> impl Iterator<Item = &Role> { self.0.iter() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn is_elevated(&self) -> bool { self.0.iter().any(Role::is_elevated) }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self { Self(iter.into_iter().collect()) }
}

/// The request-scoped actor. Rebuilt from a verified token on every request; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// `None` only for the synthetic anonymous principal.
    pub identity_id: Option<Uuid>,
    pub roles: RoleSet,
    pub elevated: bool,
}

impl Principal {
    pub fn authenticated(identity_id: Uuid, roles: RoleSet) -> Self {
        let elevated = roles.is_elevated();
        Self { identity_id: Some(identity_id), roles, elevated }
    }

    /// Principal used on public routes; token verification is skipped entirely for them.
    pub fn anonymous() -> Self {
        Self { identity_id: None, roles: RoleSet::single(Role::Anonymous), elevated: false }
    }

    pub fn is_anonymous(&self) -> bool { self.identity_id.is_none() }

    /// Identity id of an authenticated principal; anonymous principals are rejected.
    pub fn require_identity(&self) -> crate::error::AppResult<Uuid> {
        self.identity_id.ok_or_else(crate::error::AppError::invalid_token)
    }
}
