//! Persisted record shapes. Every mutable record carries exactly one owner id, fixed at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::identity::RoleSet;
use crate::ownership::OwnedResource;
use crate::signing::{ContentSignature, Keypair};

/// An account. Never serialized directly; responses go through the identity projections.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub name: Option<String>,
    pub handle: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub secret_hash: String,
    pub roles: RoleSet,
    pub keypair: Option<Keypair>,
    pub profile: Value,
    pub is_listed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }
}

impl OwnedResource for Identity {
    const KIND: &'static str = "user";
    fn id(&self) -> Uuid { self.id }
    // an account owns itself
    fn owner_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    /// more than three months
    ApartmentShortTermRental,
    /// less than three months
    ApartmentLongTermRental,
    ApartmentSale,
}

impl EntryType {
    pub const ALL: [EntryType; 3] =
        [EntryType::ApartmentShortTermRental, EntryType::ApartmentLongTermRental, EntryType::ApartmentSale];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::ApartmentShortTermRental => "apartment-short-term-rental",
            EntryType::ApartmentLongTermRental => "apartment-long-term-rental",
            EntryType::ApartmentSale => "apartment-sale",
        }
    }
}

impl FromStr for EntryType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryType::ALL.into_iter().find(|t| t.as_str() == s).ok_or(())
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub data: Value,
    pub file_ids: Vec<Uuid>,
    pub owner_id: Uuid,
    pub signature: Option<ContentSignature>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// The exact value a signature on this entry covers: the owner-editable fields, nothing else.
    pub fn signed_payload(&self) -> Value {
        entry_payload(self.entry_type, &self.data, &self.file_ids)
    }
}

pub fn entry_payload(entry_type: EntryType, data: &Value, file_ids: &[Uuid]) -> Value {
    serde_json::json!({ "type": entry_type, "data": data, "file_ids": file_ids })
}

impl OwnedResource for Entry {
    const KIND: &'static str = "entry";
    fn id(&self) -> Uuid { self.id }
    fn owner_id(&self) -> Uuid { self.owner_id }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub body: String,
    pub owner_id: Uuid,
    pub signature: Option<ContentSignature>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn signed_payload(&self) -> Value { comment_payload(self.entry_id, &self.body) }
}

pub fn comment_payload(entry_id: Uuid, body: &str) -> Value {
    serde_json::json!({ "entry_id": entry_id, "body": body })
}

impl OwnedResource for Comment {
    const KIND: &'static str = "comment";
    fn id(&self) -> Uuid { self.id }
    fn owner_id(&self) -> Uuid { self.owner_id }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum VoteTarget {
    Entry(Uuid),
    Comment(Uuid),
}

/// `0` is a vote for the target, `1` a vote against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum VoteDirection {
    Up,
    Down,
}

impl From<VoteDirection> for u8 {
    fn from(v: VoteDirection) -> u8 {
        match v {
            VoteDirection::Up => 0,
            VoteDirection::Down => 1,
        }
    }
}

impl TryFrom<u8> for VoteDirection {
    type Error = String;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(VoteDirection::Up),
            1 => Ok(VoteDirection::Down),
            other => Err(format!("invalid vote {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub target: VoteTarget,
    pub vote: VoteDirection,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl OwnedResource for Vote {
    const KIND: &'static str = "vote";
    fn id(&self) -> Uuid { self.id }
    fn owner_id(&self) -> Uuid { self.owner_id }
}

/// Metadata for an uploaded object. Provisional until some entry references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub title: String,
    pub path: String,
    pub mime: String,
    pub size: u64,
    pub owner_id: Uuid,
    pub is_provisional: bool,
    pub created_at: DateTime<Utc>,
}

impl OwnedResource for FileRecord {
    const KIND: &'static str = "file";
    fn id(&self) -> Uuid { self.id }
    fn owner_id(&self) -> Uuid { self.owner_id }
}
