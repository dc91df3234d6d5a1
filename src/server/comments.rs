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
use crate::ownership::{authorize_ownership, not_found, parse_id, CommentKind, OwnerCheck};
use crate::signing::SignatureStatus;
use crate::storage::{comment_payload, Comment, Entry, Repository, VoteTarget};

pub const MAX_BODY_CHARS: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub signature_status: SignatureStatus,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        let signature_status = if comment.signature.is_some() { SignatureStatus::Signed } else { SignatureStatus::Unsigned };
        Self { comment, signature_status }
    }
}

fn check_body(raw: &str) -> AppResult<String> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(AppError::user("comment_required", "Comment body is required."));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(AppError::user("comment_too_long", format!("Comment must be at most {} characters.", MAX_BODY_CHARS)));
    }
    Ok(body.to_string())
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentQuery {
    pub entry_id: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn list_comments(State(state): State<AppState>, Params(query): Params<CommentQuery>) -> AppResult<Json<Page<CommentView>>> {
    let raw = query.entry_id.as_deref().map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        AppError::user("entry_id_required", "You need to supply an entry ID (entry_id) query param to fetch comments.")
    })?;
    let entry_id = parse_id::<Entry>(raw)?;
    let rows = state.store.comments().list_where(&|c: &Comment| c.entry_id == entry_id);
    let paging = Pagination { page: query.page, limit: query.limit };
    Ok(Json(paging.apply(rows)?.map(CommentView::from)))
}

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub entry_id: Uuid,
    pub body: String,
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Payload(input): Payload<NewComment>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let author = acting_identity(&state, &principal)?;
    let body = check_body(&input.body)?;
    state.store.entries().find(input.entry_id).ok_or_else(not_found::<Entry>)?;

    let payload = comment_payload(input.entry_id, &body);
    let outcome = state.signer.sign(author.id, author.keypair.as_ref(), &payload).await;
    let now = Utc::now();
    let stored = state.store.comments().insert(Comment {
        id: Uuid::new_v4(),
        entry_id: input.entry_id,
        body,
        owner_id: author.id,
        signature: outcome.into_signature(),
        created_at: now,
        updated_at: now,
    })?;
    tracing::info!(target: "comments", comment = %stored.id, entry = %stored.entry_id, signed = stored.signature.is_some(), "comment created");
    Ok((StatusCode::CREATED, Json(CommentView::from(stored))))
}

#[derive(Debug, Deserialize)]
pub struct CommentChanges {
    pub body: String,
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(raw_id): Path<String>,
    Payload(changes): Payload<CommentChanges>,
) -> AppResult<Json<CommentView>> {
    let current = authorize_ownership::<CommentKind>(&principal, state.store.as_ref(), &raw_id)?;
    let editor = acting_identity(&state, &principal)?;
    let body = check_body(&changes.body)?;

    let payload = comment_payload(current.entry_id, &body);
    let signature = state.signer.sign(editor.id, editor.keypair.as_ref(), &payload).await.into_signature();

    let check = OwnerCheck::for_principal(&principal)?;
    let updated = state.store.comments().update_owned(current.id, check, &mut |c: &mut Comment| {
        c.body = body.clone();
        c.signature = signature.clone();
        c.updated_at = Utc::now();
    })?;
    Ok(Json(CommentView::from(updated)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Value>> {
    acting_identity(&state, &principal)?;
    let comment = authorize_ownership::<CommentKind>(&principal, state.store.as_ref(), &raw_id)?;
    let check = OwnerCheck::for_principal(&principal)?;
    state.store.comments().delete_owned(comment.id, check)?;
    let votes = remove_votes_on(state.store.as_ref(), VoteTarget::Comment(comment.id));
    tracing::info!(target: "comments", comment = %comment.id, votes, by = ?principal.identity_id, "comment deleted");
    Ok(Json(json!({"deleted": 1})))
}
