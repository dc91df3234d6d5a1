use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{Comment, Entry, FileRecord, Identity, IdentityIndex, Repository, Store, UniqueField, Vote};
use crate::error::{AppError, AppResult};
use crate::ownership::{self, OwnedResource, OwnerCheck};

#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    record: T,
}

#[derive(Debug)]
struct Rows<T> {
    map: HashMap<Uuid, Row<T>>,
    next_seq: u64,
}

impl<T> Default for Rows<T> {
    fn default() -> Self { Self { map: HashMap::new(), next_seq: 0 } }
}

impl<T: Clone> Rows<T> {
    fn push(&mut self, id: Uuid, record: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.map.insert(id, Row { seq, record });
    }

    fn newest_first(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        let mut rows: Vec<&Row<T>> = self.map.values().filter(|r| keep(&r.record)).collect();
        rows.sort_by(|a, b| b.seq.cmp(&a.seq));
        rows.into_iter().map(|r| r.record.clone()).collect()
    }
}

/// One in-memory table guarded by a single `RwLock`. Locks are never held across an `.await`.
#[derive(Debug)]
pub struct Table<T> {
    rows: RwLock<Rows<T>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self { Self { rows: RwLock::new(Rows::default()) } }
}

impl<T: OwnedResource> Table<T> {
    pub fn len(&self) -> usize { self.rows.read().map.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl<T: OwnedResource> Repository<T> for Table<T> {
    fn find(&self, id: Uuid) -> Option<T> {
        self.rows.read().map.get(&id).map(|r| r.record.clone())
    }

    fn insert(&self, record: T) -> AppResult<T> {
        let mut w = self.rows.write();
        if w.map.contains_key(&record.id()) {
            return Err(AppError::conflict("duplicate_id", format!("{} already exists.", T::KIND)));
        }
        w.push(record.id(), record.clone());
        Ok(record)
    }

    fn insert_unless(&self, record: T, clash: &dyn Fn(&T) -> bool) -> Option<T> {
        let mut w = self.rows.write();
        if w.map.contains_key(&record.id()) || w.map.values().any(|r| clash(&r.record)) {
            return None;
        }
        w.push(record.id(), record.clone());
        Some(record)
    }

    fn list_where(&self, filter: &dyn Fn(&T) -> bool) -> Vec<T> {
        self.rows.read().newest_first(filter)
    }

    fn update_owned(&self, id: Uuid, check: OwnerCheck, change: &mut dyn FnMut(&mut T)) -> AppResult<T> {
        let mut w = self.rows.write();
        let row = w.map.get_mut(&id).ok_or_else(ownership::not_found::<T>)?;
        if !check.permits(row.record.owner_id()) {
            return Err(ownership::forbidden::<T>());
        }
        change(&mut row.record);
        Ok(row.record.clone())
    }

    fn delete_owned(&self, id: Uuid, check: OwnerCheck) -> AppResult<T> {
        let mut w = self.rows.write();
        let owner = w.map.get(&id).map(|r| r.record.owner_id()).ok_or_else(ownership::not_found::<T>)?;
        if !check.permits(owner) {
            return Err(ownership::forbidden::<T>());
        }
        w.map.remove(&id).map(|r| r.record).ok_or_else(ownership::not_found::<T>)
    }
}

#[derive(Debug, Default)]
struct IdentityRows {
    rows: Rows<Identity>,
    handles: HashMap<String, Uuid>,
    emails: HashMap<String, Uuid>,
    phones: HashMap<String, Uuid>,
}

impl IdentityRows {
    fn lookup(&self, index: &HashMap<String, Uuid>, key: &str) -> Option<Identity> {
        index.get(key).and_then(|id| self.rows.map.get(id)).map(|r| r.record.clone())
    }

    fn live(&self, id: &Uuid) -> Option<&Row<Identity>> {
        self.rows.map.get(id).filter(|r| !r.record.is_deleted())
    }

    fn insert(&mut self, identity: Identity) -> Result<Identity, UniqueField> {
        if self.rows.map.contains_key(&identity.id) || self.handles.contains_key(&identity.handle) {
            return Err(UniqueField::Handle);
        }
        if identity.email.as_ref().is_some_and(|e| self.emails.contains_key(e)) {
            return Err(UniqueField::Email);
        }
        if identity.phone.as_ref().is_some_and(|p| self.phones.contains_key(p)) {
            return Err(UniqueField::Phone);
        }
        self.handles.insert(identity.handle.clone(), identity.id);
        if let Some(email) = &identity.email {
            self.emails.insert(email.clone(), identity.id);
        }
        if let Some(phone) = &identity.phone {
            self.phones.insert(phone.clone(), identity.id);
        }
        self.rows.push(identity.id, identity.clone());
        Ok(identity)
    }
}

/// Identity table with unique handle/email/phone indexes. Deletion is soft; unique values stay reserved.
#[derive(Debug, Default)]
pub struct IdentityTable {
    inner: RwLock<IdentityRows>,
}

fn same_unique_fields(a: &Identity, b: &Identity) -> bool {
    a.handle == b.handle && a.email == b.email && a.phone == b.phone
}

impl IdentityIndex for IdentityTable {
    fn by_handle(&self, handle: &str) -> Option<Identity> {
        let r = self.inner.read();
        r.lookup(&r.handles, handle)
    }

    fn by_email(&self, email: &str) -> Option<Identity> {
        let r = self.inner.read();
        r.lookup(&r.emails, email)
    }

    fn by_phone(&self, phone: &str) -> Option<Identity> {
        let r = self.inner.read();
        r.lookup(&r.phones, phone)
    }

    fn insert_unique(&self, identity: Identity) -> Result<Identity, UniqueField> {
        self.inner.write().insert(identity)
    }
}

impl Repository<Identity> for IdentityTable {
    fn find(&self, id: Uuid) -> Option<Identity> {
        self.inner.read().live(&id).map(|r| r.record.clone())
    }

    fn insert(&self, record: Identity) -> AppResult<Identity> {
        self.insert_unique(record).map_err(|field| {
            let what = match field {
                UniqueField::Handle => "Username",
                UniqueField::Email => "Email",
                UniqueField::Phone => "Phone",
            };
            AppError::conflict("identity_exists", format!("{} is already taken.", what))
        })
    }

    fn insert_unless(&self, record: Identity, clash: &dyn Fn(&Identity) -> bool) -> Option<Identity> {
        // the clash scan and the unique insert must see the same state
        let mut w = self.inner.write();
        if w.rows.map.values().any(|r| !r.record.is_deleted() && clash(&r.record)) {
            return None;
        }
        w.insert(record).ok()
    }

    fn list_where(&self, filter: &dyn Fn(&Identity) -> bool) -> Vec<Identity> {
        self.inner.read().rows.newest_first(|i| !i.is_deleted() && filter(i))
    }

    /// Handle, email and phone are immutable through this path; the unique indexes depend on them.
    fn update_owned(&self, id: Uuid, check: OwnerCheck, change: &mut dyn FnMut(&mut Identity)) -> AppResult<Identity> {
        let mut w = self.inner.write();
        let row = w.rows.map.get_mut(&id).filter(|r| !r.record.is_deleted()).ok_or_else(ownership::not_found::<Identity>)?;
        if !check.permits(row.record.id) {
            return Err(ownership::forbidden::<Identity>());
        }
        let mut updated = row.record.clone();
        change(&mut updated);
        if updated.id != row.record.id || !same_unique_fields(&updated, &row.record) {
            return Err(AppError::user("immutable_field", "Username, email and phone cannot be changed here."));
        }
        updated.updated_at = Utc::now();
        row.record = updated.clone();
        Ok(updated)
    }

    fn delete_owned(&self, id: Uuid, check: OwnerCheck) -> AppResult<Identity> {
        let mut w = self.inner.write();
        let row = w.rows.map.get_mut(&id).filter(|r| !r.record.is_deleted()).ok_or_else(ownership::not_found::<Identity>)?;
        if !check.permits(row.record.id) {
            return Err(ownership::forbidden::<Identity>());
        }
        let now = Utc::now();
        row.record.deleted_at = Some(now);
        row.record.updated_at = now;
        Ok(row.record.clone())
    }
}

/// In-memory persistence. Each table has its own lock; no operation holds two at once.
#[derive(Debug, Default)]
pub struct MemoryStore {
    identities: IdentityTable,
    entries: Table<Entry>,
    comments: Table<Comment>,
    votes: Table<Vote>,
    files: Table<FileRecord>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl Store for MemoryStore {
    fn identities(&self) -> &dyn Repository<Identity> { &self.identities }
    fn identity_index(&self) -> &dyn IdentityIndex { &self.identities }
    fn entries(&self) -> &dyn Repository<Entry> { &self.entries }
    fn comments(&self) -> &dyn Repository<Comment> { &self.comments }
    fn votes(&self) -> &dyn Repository<Vote> { &self.votes }
    fn files(&self) -> &dyn Repository<FileRecord> { &self.files }
}
