//! API integration tests
//!
//! Need a running server: `BIBLIO_DATABASE__URL=memory:// cargo run`, then
//! `cargo test -- --ignored`.

use biblio_server::models::{caller::UserClaims, Role};
use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Mint a token the way the identity provider would
fn token(email: &str, role: Role) -> String {
    let secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "change-this-secret-in-production".to_string());
    let now = Utc::now();
    UserClaims {
        sub: email.to_string(),
        role,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    }
    .create_token(&secret)
    .expect("Failed to sign token")
}

fn admin_token() -> String {
    token("librarian@example.org", Role::Admin)
}

async fn create_book(client: &Client, copies: i32) -> i64 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(admin_token())
        .json(&json!({
            "title": "Test Book",
            "author": "Test Author",
            "isbn": "978-0-00-000000-0",
            "publication_year": 2020,
            "available_copies": copies
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No book ID")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_ready() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_member_is_provisioned_on_first_call() {
    let client = Client::new();
    let email = format!("first.visit{}@example.org", Utc::now().timestamp_millis());

    let response = client
        .get(format!("{}/members/me", BASE_URL))
        .bearer_auth(token(&email, Role::Member))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], email.as_str());
    assert_eq!(body["first_name"], "First");
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return() {
    let client = Client::new();
    let book_id = create_book(&client, 1).await;
    let member = token(
        &format!("borrower{}@example.org", Utc::now().timestamp_millis()),
        Role::Member,
    );

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&member)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(loan["is_returned"], false);

    // last copy is out and nobody reserved it
    let other = token("someone.else@example.org", Role::Member);
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&other)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 422);
    let error: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(error["error"], "OutOfStock");

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan["id"]))
        .bearer_auth(&member)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let returned: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(returned["is_returned"], true);
}

#[tokio::test]
#[ignore]
async fn test_reserving_available_book_rejected() {
    let client = Client::new();
    let book_id = create_book(&client, 3).await;

    let response = client
        .post(format!("{}/reservations", BASE_URL))
        .bearer_auth(token("eager@example.org", Role::Member))
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_admin_dashboard_requires_admin() {
    let client = Client::new();

    let response = client
        .get(format!("{}/dashboard/admin", BASE_URL))
        .bearer_auth(token("member@example.org", Role::Member))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    let response = client
        .get(format!("{}/dashboard/admin", BASE_URL))
        .bearer_auth(admin_token())
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["total_books"].is_number());
    assert!(body["loans_per_month"].is_array());
}
