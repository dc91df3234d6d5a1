mod support;

use axum::http::StatusCode;
use serde_json::json;

use support::TestApp;
use warden::storage::Repository;

#[tokio::test]
async fn only_owner_or_admin_may_change_an_entry() {
    let app = TestApp::new();
    let (_, alice) = app.member("alice@x.com").await;
    let (_, bob) = app.member("bob@x.com").await;
    let (_, admin) = app.admin("admin@x.com").await;

    let entry = app.create_entry(&alice, json!({"rooms": 2})).await;
    let uri = format!("/entries/{}", entry["id"].as_str().unwrap());

    let (status, body) = app.send("PATCH", &uri, Some(&bob), Some(json!({"data": {"rooms": 9}}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You do not have permission to change this entry.");
    assert_eq!(app.send("DELETE", &uri, Some(&bob), None).await.0, StatusCode::FORBIDDEN);

    let (status, body) = app.send("PATCH", &uri, Some(&alice), Some(json!({"data": {"rooms": 3}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rooms"], 3);

    let (status, body) = app.send("PATCH", &uri, Some(&admin), Some(json!({"data": {"rooms": 4}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rooms"], 4);

    assert_eq!(app.send("DELETE", &uri, Some(&admin), None).await.0, StatusCode::OK);
    // existence is reported before ownership
    let (status, body) = app.send("DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Entry not found.");
}

#[tokio::test]
async fn malformed_ids_are_validation_errors() {
    let app = TestApp::new();
    let (_, alice) = app.member("alice@x.com").await;
    let (status, body) = app.send("DELETE", "/entries/not-a-uuid", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid entry id.");
    let (status, body) = app.send("GET", "/entries/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid entry id.");
}

#[tokio::test]
async fn comments_follow_the_same_owner_rule() {
    let app = TestApp::new();
    let (_, alice) = app.member("alice@x.com").await;
    let (_, bob) = app.member("bob@x.com").await;
    let entry = app.create_entry(&alice, json!({})).await;
    let entry_id = entry["id"].as_str().unwrap();

    let (status, comment) = app
        .send("POST", "/comments", Some(&bob), Some(json!({"entry_id": entry_id, "body": "nice"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["signature_status"], "signed");
    let uri = format!("/comments/{}", comment["id"].as_str().unwrap());

    assert_eq!(app.send("PATCH", &uri, Some(&alice), Some(json!({"body": "mine now"}))).await.0, StatusCode::FORBIDDEN);
    let (status, body) = app.send("PATCH", &uri, Some(&bob), Some(json!({"body": "very nice"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], "very nice");

    let (status, body) = app.send("GET", "/comments", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You need to supply an entry ID (entry_id) query param to fetch comments.");
    let (status, body) = app.send("GET", &format!("/comments?entry_id={}", entry_id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    assert_eq!(app.send("DELETE", &uri, Some(&alice), None).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.send("DELETE", &uri, Some(&bob), None).await.0, StatusCode::OK);
    assert_eq!(app.send("DELETE", &uri, Some(&bob), None).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn one_vote_per_identity_per_target() {
    let app = TestApp::new();
    let (_, alice) = app.member("alice@x.com").await;
    let (_, bob) = app.member("bob@x.com").await;
    let entry = app.create_entry(&alice, json!({})).await;
    let entry_id = entry["id"].as_str().unwrap();

    let (status, vote) = app.send("POST", "/votes", Some(&bob), Some(json!({"entry_id": entry_id, "vote": 0}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.send("POST", "/votes", Some(&bob), Some(json!({"entry_id": entry_id, "vote": 1}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Vote already cast.");
    let (status, body) = app.send("POST", "/votes", Some(&alice), Some(json!({"entry_id": entry_id, "vote": 7}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid vote. Valid: 0 (up), 1 (down).");
    app.send("POST", "/votes", Some(&alice), Some(json!({"entry_id": entry_id, "vote": 1}))).await;

    let (status, tally) = app.send("GET", &format!("/votes?type=entry&id={}", entry_id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tally, json!({"up": 1, "down": 1}));
    let (status, body) = app.send("GET", &format!("/votes?type=house&id={}", entry_id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid type. Valid: entry, comment.");

    let uri = format!("/votes/{}", vote["id"].as_str().unwrap());
    assert_eq!(app.send("DELETE", &uri, Some(&alice), None).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.send("DELETE", &uri, Some(&bob), None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn files_are_owned_and_attach_to_entries() {
    let app = TestApp::new();
    let (_, alice) = app.member("alice@x.com").await;
    let (_, bob) = app.member("bob@x.com").await;

    let (status, file) = app
        .send("POST", "/files", Some(&alice), Some(json!({"title": "front", "path": "uploads/front.jpg", "mime": "image/jpeg", "size": 10})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(file["is_provisional"], true);
    let file_id = file["id"].as_str().unwrap();

    // bob cannot attach alice's file
    let (status, _) = app
        .send("POST", "/entries", Some(&bob), Some(json!({"type": "apartment-sale", "data": {}, "file_ids": [file_id]})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app
        .send("POST", "/entries", Some(&alice), Some(json!({"type": "apartment-sale", "data": {}, "file_ids": [uuid::Uuid::new_v4()]})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, _) = app
        .send("POST", "/entries", Some(&alice), Some(json!({"type": "apartment-sale", "data": {}, "file_ids": [file_id]})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, mine) = app.send("GET", "/files", Some(&alice), None).await;
    assert_eq!(mine["total"], 1);
    assert_eq!(mine["items"][0]["is_provisional"], false);
    let (_, theirs) = app.send("GET", "/files", Some(&bob), None).await;
    assert_eq!(theirs["total"], 0);

    let (status, dl) = app.send("GET", &format!("/files/{}/download", file_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dl["path"], "uploads/front.jpg");

    let uri = format!("/files/{}", file_id);
    assert_eq!(app.send("DELETE", &uri, Some(&bob), None).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.send("DELETE", &uri, Some(&alice), None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn users_delete_only_themselves_unless_admin() {
    let app = TestApp::new();
    let (alice_id, _) = app.member("alice@x.com").await;
    let (bob_id, bob) = app.member("bob@x.com").await;
    let (_, admin) = app.admin("admin@x.com").await;

    let (status, body) = app.send("DELETE", &format!("/users/{}", alice_id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You do not have permission to change this user.");

    // other members see only the public projection
    let (_, seen) = app.send("GET", &format!("/users/{}", alice_id), Some(&bob), None).await;
    assert!(seen.get("email").is_none());
    let (_, own) = app.send("GET", &format!("/users/{}", bob_id), Some(&bob), None).await;
    assert_eq!(own["email"], "bob@x.com");

    assert_eq!(app.send("DELETE", &format!("/users/{}", alice_id), Some(&admin), None).await.0, StatusCode::OK);
    assert_eq!(app.send("GET", &format!("/users/{}", alice_id), Some(&bob), None).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_an_entry_takes_its_discussion_with_it() {
    let app = TestApp::new();
    let (_, alice) = app.member("alice@x.com").await;
    let (_, bob) = app.member("bob@x.com").await;
    let entry = app.create_entry(&alice, json!({"rooms": 2})).await;
    let entry_id = entry["id"].as_str().unwrap();
    let other = app.create_entry(&alice, json!({"rooms": 3})).await;
    let other_id = other["id"].as_str().unwrap();

    let (_, comment) = app
        .send("POST", "/comments", Some(&bob), Some(json!({"entry_id": entry_id, "body": "nice"})))
        .await;
    let comment_uri = format!("/comments/{}", comment["id"].as_str().unwrap());
    app.send("POST", "/comments", Some(&bob), Some(json!({"entry_id": other_id, "body": "also nice"}))).await;
    app.send("POST", "/votes", Some(&bob), Some(json!({"entry_id": entry_id, "vote": 0}))).await;
    app.send("POST", "/votes", Some(&alice), Some(json!({"comment_id": comment["id"], "vote": 1}))).await;
    app.send("POST", "/votes", Some(&bob), Some(json!({"entry_id": other_id, "vote": 0}))).await;
    assert_eq!(app.state.store.votes().list().len(), 3);

    assert_eq!(app.send("DELETE", &format!("/entries/{}", entry_id), Some(&alice), None).await.0, StatusCode::OK);

    let (status, body) = app.send("GET", &format!("/comments?entry_id={}", entry_id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    let (status, body) = app.send("PATCH", &comment_uri, Some(&bob), Some(json!({"body": "still here?"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Comment not found.");

    // the neighbouring entry keeps its comment and vote
    assert_eq!(app.state.store.comments().list().len(), 1);
    assert_eq!(app.state.store.votes().list().len(), 1);
    let (_, tally) = app.send("GET", &format!("/votes?type=entry&id={}", other_id), Some(&bob), None).await;
    assert_eq!(tally, json!({"up": 1, "down": 0}));
}
