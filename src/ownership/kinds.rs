use super::ResourceKind;
use crate::storage::{Comment, Entry, FileRecord, Identity, Repository, Store, Vote};

pub struct EntryKind;
pub struct CommentKind;
pub struct VoteKind;
pub struct FileKind;
/// Accounts, for self-or-admin operations.
pub struct UserKind;

impl ResourceKind for EntryKind {
    type Record = Entry;
    fn repository(store: &dyn Store) -> &dyn Repository<Entry> { store.entries() }
}

impl ResourceKind for CommentKind {
    type Record = Comment;
    fn repository(store: &dyn Store) -> &dyn Repository<Comment> { store.comments() }
}

impl ResourceKind for VoteKind {
    type Record = Vote;
    fn repository(store: &dyn Store) -> &dyn Repository<Vote> { store.votes() }
}

impl ResourceKind for FileKind {
    type Record = FileRecord;
    fn repository(store: &dyn Store) -> &dyn Repository<FileRecord> { store.files() }
}

impl ResourceKind for UserKind {
    type Record = Identity;
    fn repository(store: &dyn Store) -> &dyn Repository<Identity> { store.identities() }
}
