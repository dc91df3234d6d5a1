//! Persistence collaborator.
//!
//! The trust layer only needs a small surface from persistence: lookup by id, insert, listing, and
//! conditional mutation that re-checks existence and ownership under the same write lock as the change.
//! `MemoryStore` is the provided implementation; a database-backed store would implement the same traits.

mod memory;
mod records;

use uuid::Uuid;

use crate::error::AppResult;
use crate::ownership::{OwnedResource, OwnerCheck};

pub use memory::{IdentityTable, MemoryStore, Table};
pub use records::{
    comment_payload, entry_payload, Comment, Entry, EntryType, FileRecord, Identity, Vote, VoteDirection, VoteTarget,
};

/// Storage for one owned record kind.
pub trait Repository<T: OwnedResource>: Send + Sync {
    /// Live record by id. Soft-deleted records are not returned.
    fn find(&self, id: Uuid) -> Option<T>;

    /// Insert a new record. Conflict if the id (or a unique attribute) is already taken.
    fn insert(&self, record: T) -> AppResult<T>;

    /// Insert unless an existing live record satisfies `clash`; the check and the insert share one write lock.
    /// Returns `None` when a clash was found.
    fn insert_unless(&self, record: T, clash: &dyn Fn(&T) -> bool) -> Option<T>;

    /// Live records matching `filter`, newest first.
    fn list_where(&self, filter: &dyn Fn(&T) -> bool) -> Vec<T>;

    fn list(&self) -> Vec<T> { self.list_where(&|_| true) }

    /// Apply `change` if the record exists and `check` permits its owner. NotFound / Forbidden otherwise.
    fn update_owned(&self, id: Uuid, check: OwnerCheck, change: &mut dyn FnMut(&mut T)) -> AppResult<T>;

    /// Remove the record if it exists and `check` permits its owner. A second delete reports NotFound.
    fn delete_owned(&self, id: Uuid, check: OwnerCheck) -> AppResult<T>;
}

/// Which unique identity attribute an insert collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Handle,
    Email,
    Phone,
}

/// Identity lookups by unique attribute. These include soft-deleted identities, whose handle, email
/// and phone stay reserved.
pub trait IdentityIndex: Send + Sync {
    fn by_handle(&self, handle: &str) -> Option<Identity>;
    fn by_email(&self, email: &str) -> Option<Identity>;
    fn by_phone(&self, phone: &str) -> Option<Identity>;

    fn handle_taken(&self, handle: &str) -> bool { self.by_handle(handle).is_some() }

    /// Insert enforcing uniqueness of id, handle, email and phone atomically.
    fn insert_unique(&self, identity: Identity) -> Result<Identity, UniqueField>;
}

pub trait Store: Send + Sync {
    fn identities(&self) -> &dyn Repository<Identity>;
    fn identity_index(&self) -> &dyn IdentityIndex;
    fn entries(&self) -> &dyn Repository<Entry>;
    fn comments(&self) -> &dyn Repository<Comment>;
    fn votes(&self) -> &dyn Repository<Vote>;
    fn files(&self) -> &dyn Repository<FileRecord>;
}
