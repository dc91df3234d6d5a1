//! Per-request trust pipeline in front of every handler:
//! bearer token (skipped on the public allow-list) → route policy. Anonymous requests go through the
//! policy too, under the `anonymous` role. The resulting `Principal` is placed in the request
//! extensions for handlers to extract.

use axum::extract::{MatchedPath, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::{bearer_token, Principal};
use crate::policy::{is_public, Method};

fn authenticate(state: &AppState, req: &Request, route: &str, method: Method) -> AppResult<Principal> {
    if is_public(route, method) {
        // a token on a public route is not even parsed
        return Ok(Principal::anonymous());
    }
    let raw = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(AppError::invalid_token)?;
    state.verifier.verify(raw)
}

fn resolve_principal(state: &AppState, req: &Request, route: &str, method: Method) -> AppResult<Principal> {
    let principal = authenticate(state, req, route, method)?;

    let decision = state.policy.decide(&principal, route, method);
    if !decision.allow {
        tracing::info!(
            target: "policy",
            route,
            %method,
            principal = ?principal.identity_id,
            reason = decision.reason.as_deref().unwrap_or(""),
            "route denied"
        );
        return Err(AppError::route_forbidden());
    }
    Ok(principal)
}

pub async fn gate(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    // methods the policy vocabulary cannot express are denied outright
    let method = Method::from_http(req.method()).ok_or_else(AppError::route_forbidden)?;

    let principal = resolve_principal(&state, &req, &route, method)?;
    crate::tprintln!("gate {} {} -> {:?}", method, route, principal.identity_id);
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
