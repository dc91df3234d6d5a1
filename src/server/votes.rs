//! Votes on entries and comments. One vote per identity per target; votes carry no payload and are
//! not signed.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::accounts::acting_identity;
use super::extract::{Params, Payload};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::Principal;
use crate::ownership::{authorize_ownership, not_found, parse_id, OwnerCheck, VoteKind};
use crate::storage::{Comment, Entry, Repository, Store, Vote, VoteDirection, VoteTarget};

fn invalid_vote() -> AppError {
    AppError::user("invalid_vote", "Invalid vote. Valid: 0 (up), 1 (down).")
}

fn invalid_target_type() -> AppError {
    AppError::user("invalid_vote_type", "Invalid type. Valid: entry, comment.")
}

fn target_exists(store: &dyn Store, target: VoteTarget) -> AppResult<()> {
    match target {
        VoteTarget::Entry(id) => store.entries().find(id).map(|_| ()).ok_or_else(not_found::<Entry>),
        VoteTarget::Comment(id) => store.comments().find(id).map(|_| ()).ok_or_else(not_found::<Comment>),
    }
}

#[derive(Debug, Deserialize)]
pub struct TallyQuery {
    #[serde(rename = "type")]
    pub target_type: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub up: usize,
    pub down: usize,
}

pub async fn tally(State(state): State<AppState>, Params(query): Params<TallyQuery>) -> AppResult<Json<Tally>> {
    let raw_id = query.id.as_deref().unwrap_or_default();
    let target = match query.target_type.as_deref().map(str::trim) {
        Some("entry") => VoteTarget::Entry(parse_id::<Entry>(raw_id)?),
        Some("comment") => VoteTarget::Comment(parse_id::<Comment>(raw_id)?),
        _ => return Err(invalid_target_type()),
    };
    target_exists(state.store.as_ref(), target)?;
    let votes = state.store.votes().list_where(&|v: &Vote| v.target == target);
    let up = votes.iter().filter(|v| v.vote == VoteDirection::Up).count();
    Ok(Json(Tally { up, down: votes.len() - up }))
}

#[derive(Debug, Deserialize)]
pub struct NewVote {
    pub entry_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    /// Kept loose so out-of-range values get the documented message instead of a serde error.
    #[serde(default)]
    pub vote: Value,
}

impl NewVote {
    fn target(&self) -> AppResult<VoteTarget> {
        match (self.entry_id, self.comment_id) {
            (Some(id), None) => Ok(VoteTarget::Entry(id)),
            (None, Some(id)) => Ok(VoteTarget::Comment(id)),
            _ => Err(AppError::user("invalid_vote_target", "Supply exactly one of entry_id or comment_id.")),
        }
    }

    fn direction(&self) -> AppResult<VoteDirection> {
        let raw = self.vote.as_u64().ok_or_else(invalid_vote)?;
        u8::try_from(raw).ok().and_then(|v| VoteDirection::try_from(v).ok()).ok_or_else(invalid_vote)
    }
}

pub async fn cast_vote(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Payload(input): Payload<NewVote>,
) -> AppResult<(StatusCode, Json<Vote>)> {
    let voter = acting_identity(&state, &principal)?;
    let target = input.target()?;
    let direction = input.direction()?;
    target_exists(state.store.as_ref(), target)?;

    let vote = Vote { id: Uuid::new_v4(), target, vote: direction, owner_id: voter.id, created_at: Utc::now() };
    let stored = state
        .store
        .votes()
        .insert_unless(vote, &|v: &Vote| v.owner_id == voter.id && v.target == target)
        .ok_or_else(|| AppError::conflict("vote_exists", "Vote already cast."))?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Drop every vote cast on `target`. Returns how many went.
pub(super) fn remove_votes_on(store: &dyn Store, target: VoteTarget) -> usize {
    let mut removed = 0;
    for vote in store.votes().list_where(&|v: &Vote| v.target == target) {
        if store.votes().delete_owned(vote.id, OwnerCheck::Elevated).is_ok() {
            removed += 1;
        }
    }
    removed
}

pub async fn delete_vote(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Value>> {
    acting_identity(&state, &principal)?;
    let vote = authorize_ownership::<VoteKind>(&principal, state.store.as_ref(), &raw_id)?;
    let check = OwnerCheck::for_principal(&principal)?;
    state.store.votes().delete_owned(vote.id, check)?;
    Ok(Json(json!({"deleted": 1})))
}
