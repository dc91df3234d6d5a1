//! Real-estate listing entries. Payload-bearing: every create/update is signed with the acting identity's key
//! when it has one, and stored regardless of the signing outcome.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::accounts::acting_identity;
use super::votes::remove_votes_on;
use super::extract::{Page, Pagination, Params, Payload};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::Principal;
use crate::ownership::{authorize_ownership, not_found, parse_id, EntryKind, OwnerCheck};
use crate::signing::SignatureStatus;
use crate::storage::{entry_payload, Comment, Entry, EntryType, FileRecord, Repository, Store, VoteTarget};

/// An entry as returned to clients, with the signing state spelled out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: Entry,
    pub signature_status: SignatureStatus,
}

impl From<Entry> for EntryView {
    fn from(entry: Entry) -> Self {
        let signature_status = if entry.signature.is_some() { SignatureStatus::Signed } else { SignatureStatus::Unsigned };
        Self { entry, signature_status }
    }
}

fn parse_entry_type(raw: &str) -> AppResult<EntryType> {
    raw.trim().parse::<EntryType>().map_err(|_| {
        let valid: Vec<&str> = EntryType::ALL.iter().map(EntryType::as_str).collect();
        AppError::user("invalid_entry_type", format!("Invalid type. Valid: {}.", valid.join(", ")))
    })
}

fn check_data(data: &Value) -> AppResult<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(AppError::user("invalid_entry_data", "Entry data must be a JSON object."))
    }
}

/// Every referenced file must exist and be attachable by the caller.
fn check_files(state: &AppState, principal: &Principal, file_ids: &[Uuid]) -> AppResult<()> {
    let check = OwnerCheck::for_principal(principal)?;
    for id in file_ids {
        let file = state
            .store
            .files()
            .find(*id)
            .ok_or_else(|| AppError::user("unknown_file", format!("File {} does not exist.", id)))?;
        if !check.permits(file.owner_id) {
            return Err(AppError::forbidden("not_owner", format!("File {} belongs to someone else.", id)));
        }
    }
    Ok(())
}

fn attach_files(state: &AppState, file_ids: &[Uuid]) {
    for id in file_ids {
        let res = state
            .store
            .files()
            .update_owned(*id, OwnerCheck::Elevated, &mut |f: &mut FileRecord| f.is_provisional = false);
        if let Err(e) = res {
            // file removed between validation and attach; the entry keeps the dangling reference
            tracing::warn!(target: "storage", file = %id, error = %e, "could not mark file attached");
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub data: Value,
    #[serde(default)]
    pub file_ids: Vec<Uuid>,
}

pub async fn create_entry(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Payload(input): Payload<NewEntry>,
) -> AppResult<(StatusCode, Json<EntryView>)> {
    let author = acting_identity(&state, &principal)?;
    let entry_type = parse_entry_type(&input.entry_type)?;
    check_data(&input.data)?;
    check_files(&state, &principal, &input.file_ids)?;

    let payload = entry_payload(entry_type, &input.data, &input.file_ids);
    let outcome = state.signer.sign(author.id, author.keypair.as_ref(), &payload).await;
    let now = Utc::now();
    let entry = Entry {
        id: Uuid::new_v4(),
        entry_type,
        data: input.data,
        file_ids: input.file_ids,
        owner_id: author.id,
        signature: outcome.into_signature(),
        created_at: now,
        updated_at: now,
    };
    let stored = state.store.entries().insert(entry)?;
    attach_files(&state, &stored.file_ids);
    tracing::info!(target: "entries", entry = %stored.id, owner = %stored.owner_id, signed = stored.signature.is_some(), "entry created");
    Ok((StatusCode::CREATED, Json(EntryView::from(stored))))
}

#[derive(Debug, Default, Deserialize)]
pub struct EntryFilter {
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub owner_id: Option<Uuid>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn list_entries(State(state): State<AppState>, Params(filter): Params<EntryFilter>) -> AppResult<Json<Page<EntryView>>> {
    let entry_type = filter.entry_type.as_deref().map(parse_entry_type).transpose()?;
    let owner = filter.owner_id;
    let rows = state.store.entries().list_where(&|e: &Entry| {
        entry_type.map_or(true, |t| e.entry_type == t) && owner.map_or(true, |o| e.owner_id == o)
    });
    let paging = Pagination { page: filter.page, limit: filter.limit };
    Ok(Json(paging.apply(rows)?.map(EntryView::from)))
}

pub async fn get_entry(State(state): State<AppState>, Path(raw_id): Path<String>) -> AppResult<Json<EntryView>> {
    let id = parse_id::<Entry>(&raw_id)?;
    let entry = state.store.entries().find(id).ok_or_else(not_found::<Entry>)?;
    Ok(Json(EntryView::from(entry)))
}

#[derive(Debug, Default, Deserialize)]
pub struct EntryChanges {
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub data: Option<Value>,
    pub file_ids: Option<Vec<Uuid>>,
}

/// Owner or elevated only. The new version is signed by whoever makes the change; if that fails the
/// previous signature is dropped rather than left covering a payload that no longer exists.
pub async fn update_entry(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(raw_id): Path<String>,
    Payload(changes): Payload<EntryChanges>,
) -> AppResult<Json<EntryView>> {
    let current = authorize_ownership::<EntryKind>(&principal, state.store.as_ref(), &raw_id)?;
    let editor = acting_identity(&state, &principal)?;

    let entry_type = match changes.entry_type.as_deref() {
        Some(raw) => parse_entry_type(raw)?,
        None => current.entry_type,
    };
    let data = changes.data.unwrap_or(current.data);
    check_data(&data)?;
    let file_ids = changes.file_ids.unwrap_or(current.file_ids);
    check_files(&state, &principal, &file_ids)?;

    let payload = entry_payload(entry_type, &data, &file_ids);
    let signature = state.signer.sign(editor.id, editor.keypair.as_ref(), &payload).await.into_signature();

    let check = OwnerCheck::for_principal(&principal)?;
    let updated = state.store.entries().update_owned(current.id, check, &mut |e: &mut Entry| {
        e.entry_type = entry_type;
        e.data = data.clone();
        e.file_ids = file_ids.clone();
        e.signature = signature.clone();
        e.updated_at = Utc::now();
    })?;
    attach_files(&state, &updated.file_ids);
    tracing::info!(target: "entries", entry = %updated.id, by = %editor.id, signed = updated.signature.is_some(), "entry updated");
    Ok(Json(EntryView::from(updated)))
}

/// Comments on a removed entry go with it, and so do the votes on the entry and on those comments.
/// Returns `(comments, votes)` removed.
fn remove_discussion(store: &dyn Store, entry_id: Uuid) -> (usize, usize) {
    let mut comments = 0;
    let mut votes = remove_votes_on(store, VoteTarget::Entry(entry_id));
    for comment in store.comments().list_where(&|c: &Comment| c.entry_id == entry_id) {
        if store.comments().delete_owned(comment.id, OwnerCheck::Elevated).is_ok() {
            comments += 1;
        }
        votes += remove_votes_on(store, VoteTarget::Comment(comment.id));
    }
    (comments, votes)
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Value>> {
    acting_identity(&state, &principal)?;
    let entry = authorize_ownership::<EntryKind>(&principal, state.store.as_ref(), &raw_id)?;
    let check = OwnerCheck::for_principal(&principal)?;
    state.store.entries().delete_owned(entry.id, check)?;
    let (comments, votes) = remove_discussion(state.store.as_ref(), entry.id);
    tracing::info!(target: "entries", entry = %entry.id, comments, votes, by = ?principal.identity_id, "entry deleted");
    Ok(Json(json!({"deleted": 1})))
}
