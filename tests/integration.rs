//! Integration tests for shelfmint

use std::sync::atomic::Ordering;

mod common;

use common::{login, spawn_test_server, spawn_test_server_with};

#[tokio::test]
async fn test_health_endpoint() {
    let server = spawn_test_server().await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{}/health", server.addr))
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["identities_count"], 0);
}

#[tokio::test]
async fn test_login_provisions_idempotently() {
    let server = spawn_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/users/login", server.addr))
        .json(&serde_json::json!({
            "username": "alice",
            "name": "Alice",
            "longitude": 13.4,
            "latitude": 52.5
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let first: serde_json::Value = resp.json().await.unwrap();
    let public_key = first["data"]["public_key"].as_str().unwrap().to_string();
    assert!(!public_key.is_empty());
    assert_eq!(first["data"]["longitude"], 13.4);

    // Same username: same identity, same public key, fresh token
    let resp = client
        .post(format!("http://{}/users/login", server.addr))
        .json(&serde_json::json!({ "username": "alice" }))
        .send()
        .await
        .unwrap();
    let second: serde_json::Value = resp.json().await.unwrap();

    assert_eq!(second["data"]["id"], first["data"]["id"]);
    assert_eq!(second["data"]["public_key"].as_str().unwrap(), public_key);
    assert_eq!(server.signer.activations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_login_rejects_bad_username() {
    let server = spawn_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/users/login", server.addr))
        .json(&serde_json::json!({ "username": "ab" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_requests_without_token_rejected() {
    let server = spawn_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/users/my-books", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("http://{}/users/add-book", server.addr))
        .json(&serde_json::json!({ "isbn": "111" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_add_book_is_idempotent_per_pair() {
    let server = spawn_test_server().await;
    let (_, token) = login(&server, "alice").await;
    let client = reqwest::Client::new();

    let mut token_ids = Vec::new();
    for _ in 0..3 {
        let resp = client
            .post(format!("http://{}/users/add-book", server.addr))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "isbn": "978-3-16-148410-0",
                "title": "The Rust Book",
                "author": "Steve Klabnik"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        let body: serde_json::Value = resp.json().await.unwrap();
        token_ids.push(body["data"]["token_id"].as_u64().unwrap());
    }

    assert!(token_ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(server.minting.mint_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_full_ownership_scenario() {
    let server = spawn_test_server().await;
    let (_, token) = login(&server, "alice").await;
    let client = reqwest::Client::new();

    // alice mints book 111
    let resp = client
        .post(format!("http://{}/users/add-book", server.addr))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "isbn": "111",
            "title": "Dune",
            "author": "Frank Herbert"
        }))
        .send()
        .await
        .unwrap();
    let added: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(added["data"]["status"], "minted");
    let minted_token = added["data"]["token_id"].as_u64().unwrap();
    let book_id = added["data"]["book"]["id"].as_str().unwrap().to_string();

    // book details list alice as the holder
    let resp = client
        .get(format!("http://{}/users/book-details/111", server.addr))
        .send()
        .await
        .unwrap();
    let details: serde_json::Value = resp.json().await.unwrap();
    let users = details["data"]["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["user"]["username"], "alice");
    assert_eq!(users[0]["token_id"].as_u64().unwrap(), minted_token);
    assert_eq!(
        users[0]["owner_address"].as_str().unwrap(),
        format!("owner-{}", minted_token)
    );

    // remove, my-books goes empty
    let resp = client
        .post(format!("http://{}/users/remove-book", server.addr))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "book_id": book_id }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client
        .get(format!("http://{}/users/my-books", server.addr))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());

    // re-add: reactivated with the original token, no second mint
    let resp = client
        .post(format!("http://{}/users/add-book", server.addr))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "isbn": "111" }))
        .send()
        .await
        .unwrap();
    let readded: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(readded["data"]["status"], "reactivated");
    assert_eq!(readded["data"]["token_id"].as_u64().unwrap(), minted_token);
    assert_eq!(server.minting.mint_calls.load(Ordering::SeqCst), 1);

    let resp = client
        .get(format!("http://{}/users/my-books", server.addr))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["book"]["isbn"], "111");
}

#[tokio::test]
async fn test_remove_unowned_book_forbidden() {
    let server = spawn_test_server().await;
    let (_, token) = login(&server, "alice").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/users/remove-book", server.addr))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "book_id": uuid::Uuid::new_v4() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_mint_batch_isolates_failures() {
    let server = spawn_test_server_with(Some("222".into())).await;
    let (_, token) = login(&server, "alice").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/users/mint-books", server.addr))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "name": "Alice",
            "books": [
                { "isbn": "111", "title": "One", "author": "A" },
                { "isbn": "222", "title": "Two", "author": "B" },
                { "isbn": "333", "title": "Three", "author": "C" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let body: serde_json::Value = resp.json().await.unwrap();
    let results = body["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[2]["success"], true);
    assert_eq!(server.minting.mint_calls.load(Ordering::SeqCst), 2);

    // the failed item left no ledger record; retrying it works
    let resp = client
        .get(format!("http://{}/users/my-books", server.addr))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_mint_batch_rejects_empty() {
    let server = spawn_test_server().await;
    let (_, token) = login(&server, "alice").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/users/mint-books", server.addr))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "books": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_export_private_key_requires_owner() {
    let server = spawn_test_server().await;
    let (id, token) = login(&server, "alice").await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/users/export-private-key", server.addr))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let body: serde_json::Value = resp.json().await.unwrap();
    let private_key = body["data"]["private_key"].as_str().unwrap();
    assert_eq!(private_key.len(), 64);

    // plaintext never matches what is stored at rest
    let identity_id: uuid::Uuid = id.parse().unwrap();
    let stored = server.state.get_identity(&identity_id).unwrap();
    assert_ne!(stored.private_key_enc, private_key);

    // and without a token the export is rejected
    let resp = client
        .get(format!("http://{}/users/export-private-key", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_book_details_unknown_isbn_not_found() {
    let server = spawn_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/users/book-details/000", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_invalid_isbn_rejected() {
    let server = spawn_test_server().await;
    let (_, token) = login(&server, "alice").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/users/add-book", server.addr))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "isbn": "not an isbn" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(server.minting.mint_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let server = spawn_test_server().await;
    let (_, token) = login(&server, "alice").await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{}/users/add-book", server.addr))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "isbn": "111", "title": "T", "author": "A" }))
        .send()
        .await
        .unwrap();

    let resp = client
        .get(format!("http://{}/stats", server.addr))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();

    assert_eq!(body["data"]["total_identities"], 1);
    assert_eq!(body["data"]["total_books"], 1);
    assert_eq!(body["data"]["active_ownerships"], 1);
    assert_eq!(body["data"]["total_tokens_minted"], 1);
    assert_eq!(body["data"]["orphaned_tokens"], 0);
}
