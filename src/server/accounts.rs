//! Account routes: signup, login, the caller's own account, and the user directory.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{Page, Pagination, Params, Payload};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::{IssuedToken, LoginRequest, Principal, PrivateIdentity, PublicIdentity, SignupRequest};
use crate::ownership::{authorize_ownership, not_found, parse_id, OwnerCheck, UserKind};
use crate::storage::{Identity, Repository};

/// Run CPU-heavy credential work off the async workers.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal("task_failed", e.to_string()))?
}

/// The live identity behind an authenticated principal. A token for a soft-deleted account
/// still verifies, but stops resolving here.
pub fn acting_identity(state: &AppState, principal: &Principal) -> AppResult<Identity> {
    let id = principal.require_identity()?;
    state.store.identities().find(id).ok_or_else(AppError::invalid_token)
}

pub async fn signup(
    State(state): State<AppState>,
    Payload(req): Payload<SignupRequest>,
) -> AppResult<(StatusCode, Json<PrivateIdentity>)> {
    let issuer = state.issuer.clone();
    let created = blocking(move || issuer.signup(req)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn login(State(state): State<AppState>, Payload(req): Payload<LoginRequest>) -> AppResult<Json<IssuedToken>> {
    let issuer = state.issuer.clone();
    blocking(move || issuer.login(req)).await.map(Json)
}

pub async fn me(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> AppResult<Json<PrivateIdentity>> {
    let identity = acting_identity(&state, &principal)?;
    Ok(Json(PrivateIdentity::from_identity(&identity, &state.config.domain)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub profile: Option<Value>,
    pub is_listed: Option<bool>,
}

/// Handle, email and phone are fixed after signup; only display fields change here.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Payload(update): Payload<AccountUpdate>,
) -> AppResult<Json<PrivateIdentity>> {
    let id = principal.require_identity()?;
    if let Some(profile) = &update.profile {
        if !profile.is_object() {
            return Err(AppError::user("invalid_profile", "Profile must be a JSON object."));
        }
    }
    let name = update.name.map(|n| n.trim().to_string());
    let updated = state
        .store
        .identities()
        .update_owned(id, OwnerCheck::Owner(id), &mut |identity: &mut Identity| {
            if let Some(n) = &name {
                identity.name = if n.is_empty() { None } else { Some(n.clone()) };
            }
            if let Some(p) = &update.profile {
                identity.profile = p.clone();
            }
            if let Some(listed) = update.is_listed {
                identity.is_listed = listed;
            }
        })
        .map_err(|e| if e.http_status() == 404 { AppError::invalid_token() } else { e })?;
    Ok(Json(PrivateIdentity::from_identity(&updated, &state.config.domain)))
}

/// Elevated callers see every account in full; everyone else sees listed accounts, public fields only.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Params(paging): Params<Pagination>,
) -> AppResult<Json<Value>> {
    let domain = state.config.domain.clone();
    if principal.elevated {
        let page: Page<PrivateIdentity> =
            paging.apply(state.store.identities().list())?.map(|i| PrivateIdentity::from_identity(&i, &domain));
        return Ok(Json(json!(page)));
    }
    let page: Page<PublicIdentity> = paging
        .apply(state.store.identities().list_where(&|i: &Identity| i.is_listed))?
        .map(|i| PublicIdentity::from_identity(&i, &domain));
    Ok(Json(json!(page)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id::<Identity>(&raw_id)?;
    let identity = state.store.identities().find(id).ok_or_else(not_found::<Identity>)?;
    let domain = &state.config.domain;
    if principal.elevated || principal.identity_id == Some(identity.id) {
        return Ok(Json(json!(PrivateIdentity::from_identity(&identity, domain))));
    }
    Ok(Json(json!(PublicIdentity::from_identity(&identity, domain))))
}

/// Self-or-admin soft delete. The handle, email and phone stay reserved afterwards.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Value>> {
    acting_identity(&state, &principal)?;
    let target = authorize_ownership::<UserKind>(&principal, state.store.as_ref(), &raw_id)?;
    let check = OwnerCheck::for_principal(&principal)?;
    let removed = state.store.identities().delete_owned(target.id, check)?;
    tracing::info!(target: "auth", identity = %removed.id, by = ?principal.identity_id, "identity deleted");
    Ok(Json(json!({"deleted": 1})))
}
