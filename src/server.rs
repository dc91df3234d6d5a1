//!
//! warden HTTP server
//! ------------------
//! This module defines the Axum-based HTTP API for warden.
//!
//! Responsibilities:
//! - Wiring the trust components (hasher, token issuer/verifier, policy table, content signer)
//!   around a shared `Store` into one `AppState`.
//! - Mounting every route behind the `gate` middleware: public allow-list, then bearer token, then
//!   route policy. Handlers apply the ownership guard themselves for single-resource mutations.
//! - Startup logging and the listener loop.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{delete, get, patch, post};
use axum::{middleware, Json, Router};
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::identity::{CredentialIssuer, TokenIssuer, TokenVerifier};
use crate::policy::{load_policy, PolicyTable};
use crate::security::SecretHasher;
use crate::signing::ContentSigner;
use crate::storage::{MemoryStore, Store};

pub mod accounts;
pub mod comments;
pub mod entries;
pub mod extract;
pub mod files;
pub mod gate;
pub mod votes;

/// Shared server state injected into all handlers. Everything behind it is immutable or
/// internally synchronized, so cloning per request is a handful of `Arc` bumps.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub policy: Arc<PolicyTable>,
    pub verifier: Arc<TokenVerifier>,
    pub issuer: Arc<CredentialIssuer>,
    pub signer: Arc<ContentSigner>,
}

impl AppState {
    /// Build the state from configuration: in-memory store, policy loaded from `config.policy_path`.
    pub fn new(cfg: Config) -> anyhow::Result<Self> {
        let policy = load_policy(&cfg.policy_path)
            .with_context(|| format!("While loading policy source: {}", cfg.policy_path.display()))?;
        Self::with_parts(cfg, Arc::new(MemoryStore::new()), policy)
    }

    /// Assemble from an explicit store and policy table (tests, alternative persistence).
    pub fn with_parts(cfg: Config, store: Arc<dyn Store>, policy: PolicyTable) -> anyhow::Result<Self> {
        let hasher = SecretHasher::new(cfg.hasher).context("While configuring the secret hasher")?;
        let tokens = TokenIssuer::new(cfg.token_secret.clone(), cfg.token_ttl);
        let signer = ContentSigner::new(cfg.key_passphrase.clone(), cfg.hasher, cfg.signing_timeout);
        let issuer = CredentialIssuer::new(&cfg, store.clone(), hasher, tokens, signer.clone())
            .context("While preparing the credential issuer")?;
        Ok(Self {
            verifier: Arc::new(TokenVerifier::new(cfg.token_secret.clone())),
            config: Arc::new(cfg),
            store,
            policy: Arc::new(policy),
            issuer: Arc::new(issuer),
            signer: Arc::new(signer),
        })
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Every route, with the gate applied as a route layer so it sees the matched route template.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/signup", post(accounts::signup))
        .route("/login", post(accounts::login))
        .route("/account/me", get(accounts::me).patch(accounts::update_me))
        .route("/users", get(accounts::list_users))
        .route("/users/{id}", get(accounts::get_user).delete(accounts::delete_user))
        .route("/entries", get(entries::list_entries).post(entries::create_entry))
        .route(
            "/entries/{id}",
            get(entries::get_entry).patch(entries::update_entry).delete(entries::delete_entry),
        )
        .route("/comments", get(comments::list_comments).post(comments::create_comment))
        .route("/comments/{id}", patch(comments::update_comment).delete(comments::delete_comment))
        .route("/votes", get(votes::tally).post(votes::cast_vote))
        .route("/votes/{id}", delete(votes::delete_vote))
        .route("/files", get(files::list_files).post(files::register_file))
        .route("/files/{id}", delete(files::delete_file))
        .route("/files/{id}/download", get(files::download_file))
        .route_layer(middleware::from_fn_with_state(state.clone(), gate::gate))
        .with_state(state)
}

fn log_startup(cfg: &Config, policy: &PolicyTable) {
    info!(
        target: "startup",
        "warden starting. policy_path={:?}, policy_rules={}, token_ttl_secs={}, signing_timeout_ms={}, domain={}",
        cfg.policy_path,
        policy.len(),
        cfg.token_ttl.as_secs(),
        cfg.signing_timeout.as_millis(),
        cfg.domain
    );
}

/// Start the HTTP server on `cfg.http_port`. Fails before binding if the policy source cannot be loaded.
pub async fn run_with_ports(cfg: Config) -> anyhow::Result<()> {
    let http_port = cfg.http_port;
    let state = AppState::new(cfg)?;
    log_startup(&state.config, &state.policy);

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("While binding HTTP listener on {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
