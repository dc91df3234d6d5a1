//! File metadata. Object bytes live in an external blob store; only the record and its owner are
//! tracked here.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::accounts::acting_identity;
use super::extract::{Page, Pagination, Params, Payload};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::Principal;
use crate::ownership::{authorize_ownership, not_found, parse_id, FileKind, OwnerCheck};
use crate::storage::{FileRecord, Repository};

#[derive(Debug, Deserialize)]
pub struct NewFile {
    pub title: String,
    pub path: String,
    #[serde(default = "default_mime")]
    pub mime: String,
    #[serde(default)]
    pub size: u64,
}

fn default_mime() -> String { "application/octet-stream".to_string() }

/// Registers metadata for an already-uploaded object. Stays provisional until an entry references it.
pub async fn register_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Payload(input): Payload<NewFile>,
) -> AppResult<(StatusCode, Json<FileRecord>)> {
    let owner = acting_identity(&state, &principal)?;
    let title = input.title.trim();
    let path = input.path.trim();
    if title.is_empty() {
        return Err(AppError::user("file_title_required", "File title is required."));
    }
    if path.is_empty() || path.contains("..") {
        return Err(AppError::user("invalid_file_path", "Invalid file path."));
    }
    let stored = state.store.files().insert(FileRecord {
        id: Uuid::new_v4(),
        title: title.to_string(),
        path: path.to_string(),
        mime: input.mime.trim().to_string(),
        size: input.size,
        owner_id: owner.id,
        is_provisional: true,
        created_at: Utc::now(),
    })?;
    tracing::info!(target: "files", file = %stored.id, owner = %stored.owner_id, "file registered");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// The caller's own files; elevated principals see all of them.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Params(paging): Params<Pagination>,
) -> AppResult<Json<Page<FileRecord>>> {
    let check = OwnerCheck::for_principal(&principal)?;
    let rows = state.store.files().list_where(&|f: &FileRecord| check.permits(f.owner_id));
    Ok(Json(paging.apply(rows)?))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub id: Uuid,
    pub title: String,
    pub mime: String,
    pub path: String,
}

pub async fn download_file(State(state): State<AppState>, Path(raw_id): Path<String>) -> AppResult<Json<Download>> {
    let id = parse_id::<FileRecord>(&raw_id)?;
    let file = state.store.files().find(id).ok_or_else(not_found::<FileRecord>)?;
    Ok(Json(Download { id: file.id, title: file.title, mime: file.mime, path: file.path }))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Value>> {
    acting_identity(&state, &principal)?;
    let file = authorize_ownership::<FileKind>(&principal, state.store.as_ref(), &raw_id)?;
    let check = OwnerCheck::for_principal(&principal)?;
    state.store.files().delete_owned(file.id, check)?;
    tracing::info!(target: "files", file = %file.id, by = ?principal.identity_id, "file deleted");
    Ok(Json(json!({"deleted": 1})))
}
