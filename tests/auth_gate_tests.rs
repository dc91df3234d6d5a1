mod support;

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;

use support::{test_config, TestApp};
use warden::error::{INVALID_CREDENTIALS, INVALID_TOKEN, ROUTE_FORBIDDEN};
use warden::identity::{Role, RoleSet, TokenIssuer};
use warden::policy::parse_rules;
use warden::policy::PolicyTable;
use warden::server::AppState;
use warden::storage::{MemoryStore, Repository};

/// Enough anonymous rows for the test helpers to sign up and log in.
const ACCOUNT_ROWS: &str = "p, anonymous, /signup, POST\np, anonymous, /login, POST\n";

fn app_with_policy(policy: &str) -> TestApp {
    let table = PolicyTable::new(parse_rules(policy).unwrap());
    TestApp::with_state(AppState::with_parts(test_config(), std::sync::Arc::new(MemoryStore::new()), table).unwrap())
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new();
    let (status, body) = app.send("GET", "/account/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"code": 401, "message": INVALID_TOKEN}));

    let (status, _) = app.send("POST", "/entries", Some("not.a.token"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // token signed with another secret
    let forged = TokenIssuer::new(warden::config::Secret::new("some-other-secret"), test_config().token_ttl)
        .issue(uuid::Uuid::new_v4(), &RoleSet::single(Role::Admin))
        .unwrap();
    let (status, _) = app.send("GET", "/users", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn public_routes_never_need_a_token() {
    let app = TestApp::new();
    assert_eq!(app.send("GET", "/health", None, None).await.0, StatusCode::OK);
    let (status, body) = app.send("GET", "/entries", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    // a garbage token on a public route is ignored, not rejected
    assert_eq!(app.send("GET", "/entries", Some("garbage"), None).await.0, StatusCode::OK);
    let missing = uuid::Uuid::new_v4();
    assert_eq!(app.send("GET", &format!("/entries/{}", missing), None, None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.send("GET", &format!("/files/{}/download", missing), None, None).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = TestApp::new();
    let (id, _) = app.member("old@x.com").await;
    let cfg = test_config();
    let issuer = TokenIssuer::new(cfg.token_secret.clone(), cfg.token_ttl);
    let long_ago = Utc::now().timestamp() - cfg.token_ttl.as_secs() as i64 - 5;
    let expired = issuer.issue_at(id, &RoleSet::single(Role::Member), long_ago).unwrap();
    let (status, body) = app.send("GET", "/account/me", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], INVALID_TOKEN);
}

#[tokio::test]
async fn policy_denies_routes_without_a_matching_rule() {
    let app = TestApp::new();
    let (_, member) = app.member("m@x.com").await;
    let (status, body) = app.send("GET", "/users", Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"code": 403, "message": ROUTE_FORBIDDEN}));

    let (_, admin) = app.admin("root@x.com").await;
    let (status, body) = app.send("GET", "/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    // admins get the private projection
    assert!(body["items"][0].get("email").is_some());
}

#[tokio::test]
async fn removing_the_only_rule_flips_the_route_to_denied() {
    let granted = format!("{}p, member, /entries, POST\np, member, /account/me, GET\n", ACCOUNT_ROWS);
    let app = app_with_policy(&granted);
    let (_, token) = app.member("p@x.com").await;
    app.create_entry(&token, json!({"rooms": 1})).await;

    let app = app_with_policy(&format!("{}p, member, /account/me, GET\n", ACCOUNT_ROWS));
    let (_, token) = app.member("p@x.com").await;
    assert_eq!(app.send("GET", "/account/me", Some(&token), None).await.0, StatusCode::OK);
    let (status, _) = app
        .send("POST", "/entries", Some(&token), Some(json!({"type": "apartment-sale", "data": {}})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn public_routes_still_need_an_anonymous_rule() {
    let app = app_with_policy("p, member, /account/me, GET\n");
    let (status, body) = app.send("POST", "/signup", None, Some(json!({"email": "a@x.com", "password": "s1"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"code": 403, "message": ROUTE_FORBIDDEN}));
    assert_eq!(app.send("GET", "/entries", None, None).await.0, StatusCode::FORBIDDEN);
    assert!(app.state.store.identities().list().is_empty());

    // granting the one row reopens exactly that route
    let app = app_with_policy("p, anonymous, /entries, GET\n");
    assert_eq!(app.send("GET", "/entries", None, None).await.0, StatusCode::OK);
    assert_eq!(app.send("GET", "/health", None, None).await.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn listed_users_only_for_non_admin_directory_readers() {
    let app = app_with_policy(&format!("{}p, member, /users, GET\n", ACCOUNT_ROWS));
    let (status, _) = app
        .send("POST", "/signup", None, Some(json!({"email": "listed@x.com", "password": "s1", "is_listed": true})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, token) = app.member("hidden@x.com").await;

    let (status, body) = app.send("GET", "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert!(body["items"][0].get("email").is_none());
    assert!(body["items"][0]["username_with_local_part"].as_str().unwrap().starts_with("@localhost:"));
}

#[tokio::test]
async fn signup_twice_conflicts_without_duplicating() {
    let app = TestApp::new();
    let (status, body) = app.send("POST", "/signup", None, Some(json!({"email": "a@x.com", "password": "s1"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.get("secret_hash").is_none());
    assert!(body["public_key"].as_str().unwrap().contains("WARDEN PUBLIC KEY"));

    let (status, body) = app.send("POST", "/signup", None, Some(json!({"email": "a@x.com", "password": "s1"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User already exists. Reset password?");
    assert_eq!(app.state.store.identities().list().len(), 1);

    let (status, body) = app.send("POST", "/signup", None, Some(json!({"email": "nope", "password": "s1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn wrong_secret_and_unknown_contact_look_the_same() {
    let app = TestApp::new();
    app.signup("a@x.com", "s1").await;
    let wrong = app.send("POST", "/login", None, Some(json!({"email": "a@x.com", "password": "nope"}))).await;
    let unknown = app.send("POST", "/login", None, Some(json!({"email": "b@x.com", "password": "s1"}))).await;
    assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
    assert_eq!(wrong.1, json!({"code": 401, "message": INVALID_CREDENTIALS}));
}

#[tokio::test]
async fn deleted_accounts_cannot_log_in_or_act() {
    let app = TestApp::new();
    let (id, token) = app.member("gone@x.com").await;
    let (status, body) = app.send("DELETE", &format!("/users/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": 1}));

    // the old token still verifies but no longer resolves to a live identity
    assert_eq!(app.send("GET", "/account/me", Some(&token), None).await.0, StatusCode::UNAUTHORIZED);
    let (status, body) = app.send("POST", "/login", None, Some(json!({"email": "gone@x.com", "password": "s1"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], INVALID_CREDENTIALS);
    // nor clean up what the account left behind
    let (alice_id, alice) = app.member("alice@x.com").await;
    let entry = app.create_entry(&alice, json!({"rooms": 1})).await;
    let uri = format!("/entries/{}", entry["id"].as_str().unwrap());
    assert_eq!(app.send("DELETE", &format!("/users/{}", alice_id), Some(&alice), None).await.0, StatusCode::OK);
    let (status, body) = app.send("DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], INVALID_TOKEN);
    assert_eq!(app.send("GET", &uri, None, None).await.0, StatusCode::OK);
    assert_eq!(app.send("DELETE", &format!("/users/{}", alice_id), Some(&alice), None).await.0, StatusCode::UNAUTHORIZED);

    // contact stays reserved
    let (status, _) = app.send("POST", "/signup", None, Some(json!({"email": "gone@x.com", "password": "s1"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn account_update_changes_display_fields_only() {
    let app = TestApp::new();
    let (_, token) = app.member("me@x.com").await;
    let (status, body) = app
        .send("PATCH", "/account/me", Some(&token), Some(json!({"name": "Me", "profile": {"bio": "hi"}, "is_listed": true})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Me");
    assert_eq!(body["profile"]["bio"], "hi");
    assert_eq!(body["is_listed"], true);

    let (status, _) = app.send("PATCH", "/account/me", Some(&token), Some(json!({"email": "other@x.com"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.send("PATCH", "/account/me", Some(&token), Some(json!({"profile": [1, 2]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
