//! Object-level authorization for mutate/delete operations on single resources.
//!
//! Handlers call [`authorize_ownership`] after the route policy has passed. The same owner rule is
//! re-applied by the store inside its write lock ([`OwnerCheck`]), so a record that changes hands or
//! disappears between the guard and the mutation is never modified by the wrong principal.

mod kinds;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::identity::Principal;
use crate::storage::{Repository, Store};

pub use kinds::{CommentKind, EntryKind, FileKind, UserKind, VoteKind};

/// A record with exactly one owner, fixed at creation.
pub trait OwnedResource: Clone + Send + Sync + 'static {
    /// Lowercase noun used in user-facing messages ("entry", "comment", ...).
    const KIND: &'static str;
    fn id(&self) -> Uuid;
    fn owner_id(&self) -> Uuid;
}

/// Binds a resource kind to where its records live. Adding a kind means implementing this and
/// [`OwnedResource`]; the guard itself never changes.
pub trait ResourceKind {
    type Record: OwnedResource;
    fn repository(store: &dyn Store) -> &dyn Repository<Self::Record>;
}

/// Owner rule evaluated under the store's write lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerCheck {
    Elevated,
    Owner(Uuid),
}

impl OwnerCheck {
    pub fn for_principal(principal: &Principal) -> AppResult<Self> {
        if principal.elevated {
            return Ok(OwnerCheck::Elevated);
        }
        principal.require_identity().map(OwnerCheck::Owner)
    }

    pub fn permits(&self, owner_id: Uuid) -> bool {
        match self {
            OwnerCheck::Elevated => true,
            OwnerCheck::Owner(id) => *id == owner_id,
        }
    }
}

fn capitalized(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn invalid_id<T: OwnedResource>() -> AppError {
    AppError::user(format!("invalid_{}_id", T::KIND), format!("Invalid {} id.", T::KIND))
}

pub fn not_found<T: OwnedResource>() -> AppError {
    AppError::not_found(format!("{}_not_found", T::KIND), format!("{} not found.", capitalized(T::KIND)))
}

pub fn forbidden<T: OwnedResource>() -> AppError {
    AppError::forbidden("not_owner", format!("You do not have permission to change this {}.", T::KIND))
}

pub fn parse_id<T: OwnedResource>(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| invalid_id::<T>())
}

/// Steps, in order: parse id (400) → lookup (404) → elevated allows → owner match, else 403.
/// Existence is always reported before ownership.
pub fn authorize_ownership<K: ResourceKind>(principal: &Principal, store: &dyn Store, raw_id: &str) -> AppResult<K::Record> {
    let id = parse_id::<K::Record>(raw_id)?;
    let record = K::repository(store).find(id).ok_or_else(not_found::<K::Record>)?;
    if principal.elevated {
        return Ok(record);
    }
    match principal.identity_id {
        Some(pid) if pid == record.owner_id() => Ok(record),
        _ => {
            tracing::info!(target: "auth", kind = <K::Record as OwnedResource>::KIND, %id, principal = ?principal.identity_id, "ownership denied");
            Err(forbidden::<K::Record>())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Role, RoleSet};
    use crate::storage::{Comment, Entry, EntryType, MemoryStore};
    use chrono::Utc;

    fn entry(owner: Uuid) -> Entry {
        Entry {
            id: Uuid::new_v4(),
            entry_type: EntryType::ApartmentSale,
            data: serde_json::json!({"rooms": 2}),
            file_ids: vec![],
            owner_id: owner,
            signature: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member(id: Uuid) -> Principal { Principal::authenticated(id, RoleSet::single(Role::Member)) }

    #[test]
    fn messages_name_the_kind() {
        assert_eq!(invalid_id::<Entry>().message(), "Invalid entry id.");
        assert_eq!(not_found::<Comment>().message(), "Comment not found.");
        assert_eq!(forbidden::<Entry>().message(), "You do not have permission to change this entry.");
        assert_eq!(not_found::<Comment>().http_status(), 404);
        assert_eq!(forbidden::<Comment>().http_status(), 403);
    }

    #[test]
    fn guard_checks_in_order() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rec = store.entries().insert(entry(a)).unwrap();

        // malformed id wins over everything
        let err = authorize_ownership::<EntryKind>(&member(b), &store, "not-a-uuid").unwrap_err();
        assert_eq!(err.http_status(), 400);

        // missing record is 404 even for a non-owner
        let err = authorize_ownership::<EntryKind>(&member(b), &store, &Uuid::new_v4().to_string()).unwrap_err();
        assert_eq!(err, not_found::<Entry>());

        let err = authorize_ownership::<EntryKind>(&member(b), &store, &rec.id.to_string()).unwrap_err();
        assert_eq!(err, forbidden::<Entry>());

        assert_eq!(authorize_ownership::<EntryKind>(&member(a), &store, &rec.id.to_string()).unwrap().id, rec.id);

        let admin = Principal::authenticated(b, vec![Role::Member, Role::Admin].into_iter().collect());
        assert!(authorize_ownership::<EntryKind>(&admin, &store, &rec.id.to_string()).is_ok());
    }

    #[test]
    fn anonymous_principal_never_owns() {
        let store = MemoryStore::new();
        let rec = store.entries().insert(entry(Uuid::new_v4())).unwrap();
        let err = authorize_ownership::<EntryKind>(&Principal::anonymous(), &store, &rec.id.to_string()).unwrap_err();
        assert_eq!(err.http_status(), 403);
        assert!(OwnerCheck::for_principal(&Principal::anonymous()).is_err());
    }

    #[test]
    fn owner_check_rules() {
        let a = Uuid::new_v4();
        assert!(OwnerCheck::Owner(a).permits(a));
        assert!(!OwnerCheck::Owner(a).permits(Uuid::new_v4()));
        assert!(OwnerCheck::Elevated.permits(Uuid::new_v4()));
        let admin = Principal::authenticated(a, RoleSet::single(Role::Admin));
        assert_eq!(OwnerCheck::for_principal(&admin).unwrap(), OwnerCheck::Elevated);
        assert_eq!(OwnerCheck::for_principal(&member(a)).unwrap(), OwnerCheck::Owner(a));
    }
}
