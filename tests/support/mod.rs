#![allow(dead_code)]

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use warden::config::Config;
use warden::identity::Role;
use warden::ownership::OwnerCheck;
use warden::server::{build_router, AppState};
use warden::storage::{Identity, Repository};

pub fn shipped_policy() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("policy/policy.csv")
}

pub fn test_config() -> Config {
    Config { policy_path: shipped_policy(), ..Config::for_tests() }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let state = AppState::new(test_config()).expect("state");
        let router = build_router(state.clone());
        Self { state, router }
    }

    pub fn with_state(state: AppState) -> Self {
        let router = build_router(state.clone());
        Self { state, router }
    }

    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("authorization", format!("Bearer {}", t));
        }
        let req = match body {
            Some(v) => builder.header("content-type", "application/json").body(Body::from(v.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, json)
    }

    /// Sign up with an email contact; returns the new identity id.
    pub async fn signup(&self, email: &str, password: &str) -> Uuid {
        let (status, body) = self.send("POST", "/signup", None, Some(json!({"email": email, "password": password}))).await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
        body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self.send("POST", "/login", None, Some(json!({"email": email, "password": password}))).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Signup + login.
    pub async fn member(&self, email: &str) -> (Uuid, String) {
        let id = self.signup(email, "s1").await;
        (id, self.login(email, "s1").await)
    }

    /// Grant the admin role in storage, then log in again so the token carries it.
    pub async fn admin(&self, email: &str) -> (Uuid, String) {
        let id = self.signup(email, "s1").await;
        self.state
            .store
            .identities()
            .update_owned(id, OwnerCheck::Elevated, &mut |i: &mut Identity| {
                i.roles.insert(Role::Admin);
            })
            .unwrap();
        (id, self.login(email, "s1").await)
    }

    pub async fn create_entry(&self, token: &str, data: Value) -> Value {
        let (status, body) = self
            .send("POST", "/entries", Some(token), Some(json!({"type": "apartment-sale", "data": data})))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create entry failed: {}", body);
        body
    }
}
