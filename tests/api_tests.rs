//! API tests. The router is driven with `oneshot` over the in-memory lending
//! store; the `#[ignore]`d tests expect a running server with a database.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use lending_server::services::notifications::NotificationJob;

use common::{test_app, MemoryStore};

fn library() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_book(1, "Dune", 2);
    store.add_book(2, "Emma", 0);
    store.add_member(1, "ada");
    store.add_member(2, "brian");
    store
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

// ---- Health -----------------------------------------------------------------

#[tokio::test]
async fn test_health_check() {
    let (app, _jobs) = test_app(library());

    let (status, body) = send(&app, "GET", "/api/v1/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _jobs) = test_app(library());

    let (status, body) = send(&app, "GET", "/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/books/{id}/loan"].is_object());
}

// ---- Lending ----------------------------------------------------------------

#[tokio::test]
async fn test_loan_book_returns_created_loan_and_queues_confirmation() {
    let store = library();
    let (app, mut jobs) = test_app(store.clone());

    let (status, body) = send(&app, "POST", "/api/v1/books/1/loan", Some(json!({"member_id": 1}))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["status"].is_string());
    assert_eq!(body["loan"]["book_id"], 1);
    assert_eq!(body["loan"]["member_id"], 1);
    assert_eq!(body["loan"]["is_returned"], false);
    assert_eq!(store.book(1).available_copies, 1);

    let loan_id = body["loan"]["id"].as_i64().unwrap() as i32;
    assert_eq!(jobs.try_recv().unwrap(), NotificationJob::LoanIssued { loan_id });
}

#[tokio::test]
async fn test_loan_unavailable_book_is_bad_request() {
    let (app, mut jobs) = test_app(library());

    let (status, body) = send(&app, "POST", "/api/v1/books/2/loan", Some(json!({"member_id": 1}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BookNotAvailable");
    assert!(jobs.try_recv().is_err());
}

#[tokio::test]
async fn test_loan_unknown_book_is_not_found() {
    let (app, _jobs) = test_app(library());

    let (status, _) = send(&app, "POST", "/api/v1/books/99/loan", Some(json!({"member_id": 1}))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_loan_unknown_member_is_bad_request() {
    let (app, _jobs) = test_app(library());

    let (status, body) = send(&app, "POST", "/api/v1/books/1/loan", Some(json!({"member_id": 99}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Member does not exist.");
}

#[tokio::test]
async fn test_loan_without_member_id_is_bad_request() {
    let (app, _jobs) = test_app(library());

    let (status, body) = send(&app, "POST", "/api/v1/books/1/loan", Some(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_create_loan_applies_lending_rules() {
    let store = library();
    let (app, _jobs) = test_app(store.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/loans",
        Some(json!({"book_id": 1, "member_id": 2})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["member_id"], 2);
    assert_eq!(store.book(1).available_copies, 1);
}

#[tokio::test]
async fn test_return_book() {
    let store = library();
    let (app, _jobs) = test_app(store.clone());
    send(&app, "POST", "/api/v1/books/1/loan", Some(json!({"member_id": 1}))).await;

    let (status, body) = send(&app, "POST", "/api/v1/books/1/return", Some(json!({"member_id": 1}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loan"]["is_returned"], true);
    assert!(body["loan"]["return_date"].is_string());
    assert_eq!(store.book(1).available_copies, 2);
}

#[tokio::test]
async fn test_return_without_active_loan_is_bad_request() {
    let (app, _jobs) = test_app(library());

    let (status, body) = send(&app, "POST", "/api/v1/books/1/return", Some(json!({"member_id": 2}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Active loan does not exist.");
}

// ---- Extensions -------------------------------------------------------------

async fn issued_loan(app: &Router) -> (i64, String) {
    let (_, body) = send(app, "POST", "/api/v1/books/1/loan", Some(json!({"member_id": 1}))).await;
    (
        body["loan"]["id"].as_i64().unwrap(),
        body["loan"]["due_date"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_extend_due_date_by_days_and_by_duration() {
    let (app, _jobs) = test_app(library());
    let (id, due) = issued_loan(&app).await;
    let due = chrono::NaiveDate::parse_from_str(&due, "%Y-%m-%d").unwrap();

    let uri = format!("/api/v1/loans/{}/extend-due-date", id);
    let (status, body) = send(&app, "POST", &uri, Some(json!({"additional_days": 5}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["loan"]["due_date"],
        (due + chrono::Days::new(5)).format("%Y-%m-%d").to_string()
    );

    let (status, body) = send(&app, "POST", &uri, Some(json!({"additional_days": "P1W"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["loan"]["due_date"],
        (due + chrono::Days::new(12)).format("%Y-%m-%d").to_string()
    );
}

#[tokio::test]
async fn test_extend_rejects_bad_durations() {
    let (app, _jobs) = test_app(library());
    let (id, _) = issued_loan(&app).await;
    let uri = format!("/api/v1/loans/{}/extend-due-date", id);

    for bad in [json!({"additional_days": -3}), json!({"additional_days": "soon"}), json!({})] {
        let (status, body) = send(&app, "POST", &uri, Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "BadValue");
    }
}

#[tokio::test]
async fn test_extend_unknown_loan_is_not_found() {
    let (app, _jobs) = test_app(library());

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/loans/404/extend-due-date",
        Some(json!({"additional_days": 5})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---- Reports and notifications ----------------------------------------------

#[tokio::test]
async fn test_top_active_members() {
    let (app, _jobs) = test_app(library());
    send(&app, "POST", "/api/v1/books/1/loan", Some(json!({"member_id": 2}))).await;
    send(&app, "POST", "/api/v1/books/1/return", Some(json!({"member_id": 2}))).await;

    let (status, body) = send(&app, "GET", "/api/v1/members/top-active", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["member_id"], 2);
    assert_eq!(body[0]["username"], "brian");
    assert_eq!(body[0]["number_of_active_loans"], 1);
}

#[tokio::test]
async fn test_manual_overdue_scan_is_queued() {
    let (app, mut jobs) = test_app(library());

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/notifications/overdue-scan?as_of=2024-03-10",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["as_of"], "2024-03-10");
    assert_eq!(
        jobs.try_recv().unwrap(),
        NotificationJob::OverdueScan { as_of: common::date(2024, 3, 10) }
    );
}

// ---- Live server ------------------------------------------------------------

mod live {
    use reqwest::Client;
    use serde_json::{json, Value};

    const BASE_URL: &str = "http://localhost:8080/api/v1";

    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_readiness() {
        let response = Client::new()
            .get(format!("{}/ready", BASE_URL))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());
        let body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    #[ignore]
    async fn test_catalog_and_lending_round_trip() {
        let client = Client::new();
        let suffix = std::process::id();

        let author: Value = client
            .post(format!("{}/authors", BASE_URL))
            .json(&json!({"first_name": "Frank", "last_name": "Herbert"}))
            .send()
            .await
            .expect("Failed to create author")
            .json()
            .await
            .expect("Failed to parse author");

        let book: Value = client
            .post(format!("{}/books", BASE_URL))
            .json(&json!({"title": "Dune", "author_id": author["id"], "total_copies": 1}))
            .send()
            .await
            .expect("Failed to create book")
            .json()
            .await
            .expect("Failed to parse book");
        assert_eq!(book["available_copies"], 1);

        let member: Value = client
            .post(format!("{}/members", BASE_URL))
            .json(&json!({
                "username": format!("reader{}", suffix),
                "email": format!("reader{}@example.org", suffix)
            }))
            .send()
            .await
            .expect("Failed to create member")
            .json()
            .await
            .expect("Failed to parse member");

        let response = client
            .post(format!("{}/books/{}/loan", BASE_URL, book["id"]))
            .json(&json!({"member_id": member["id"]}))
            .send()
            .await
            .expect("Failed to loan book");
        assert_eq!(response.status(), 201);

        let response = client
            .post(format!("{}/books/{}/loan", BASE_URL, book["id"]))
            .json(&json!({"member_id": member["id"]}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 400);

        let response = client
            .post(format!("{}/books/{}/return", BASE_URL, book["id"]))
            .json(&json!({"member_id": member["id"]}))
            .send()
            .await
            .expect("Failed to return book");
        assert!(response.status().is_success());

        let response = client
            .delete(format!("{}/books/{}", BASE_URL, book["id"]))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 409);
    }

    async fn create(client: &Client, path: &str, body: Value) -> Value {
        let response = client
            .post(format!("{}{}", BASE_URL, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 201, "POST {}", path);
        response.json().await.expect("Failed to parse response")
    }

    /// A fresh author, a two-copy book and `members` new members
    async fn fixtures(client: &Client, tag: &str, members: usize) -> (Value, Vec<Value>) {
        let suffix = format!("{}{}", tag, std::process::id());
        let author = create(
            client,
            "/authors",
            json!({"first_name": "Jane", "last_name": format!("Austen{}", suffix)}),
        )
        .await;
        let book = create(
            client,
            "/books",
            json!({"title": format!("Emma {}", suffix), "author_id": author["id"], "total_copies": 2}),
        )
        .await;

        let mut created = Vec::new();
        for n in 0..members {
            created.push(
                create(
                    client,
                    "/members",
                    json!({
                        "username": format!("{}m{}", suffix, n),
                        "email": format!("{}m{}@example.org", suffix, n)
                    }),
                )
                .await,
            );
        }
        (book, created)
    }

    #[tokio::test]
    #[ignore]
    async fn test_extend_round_trip() {
        let client = Client::new();
        let (book, members) = fixtures(&client, "ext", 1).await;

        let issued = create(
            &client,
            &format!("/books/{}/loan", book["id"]),
            json!({"member_id": members[0]["id"]}),
        )
        .await;
        let loan_id = &issued["loan"]["id"];
        let due = chrono::NaiveDate::parse_from_str(issued["loan"]["due_date"].as_str().unwrap(), "%Y-%m-%d")
            .unwrap();

        for additional_days in [json!(5), json!("P1W")] {
            let response = client
                .post(format!("{}/loans/{}/extend-due-date", BASE_URL, loan_id))
                .json(&json!({"additional_days": additional_days}))
                .send()
                .await
                .expect("Failed to extend loan");
            assert_eq!(response.status(), 200);
        }

        let loan: Value = client
            .get(format!("{}/loans/{}", BASE_URL, loan_id))
            .send()
            .await
            .expect("Failed to fetch loan")
            .json()
            .await
            .expect("Failed to parse loan");
        assert_eq!(
            loan["due_date"],
            (due + chrono::Days::new(12)).format("%Y-%m-%d").to_string()
        );
        assert_eq!(loan["is_returned"], false);

        let response = client
            .post(format!("{}/loans/{}/extend-due-date", BASE_URL, loan_id))
            .json(&json!({"additional_days": -1}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 400);

        let response = client
            .post(format!("{}/loans/2147483647/extend-due-date", BASE_URL))
            .json(&json!({"additional_days": 5}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    #[ignore]
    async fn test_overdue_and_top_active_reports() {
        let client = Client::new();
        let (book, members) = fixtures(&client, "rep", 2).await;
        let (holder, returner) = (&members[0], &members[1]);

        create(
            &client,
            &format!("/books/{}/loan", book["id"]),
            json!({"member_id": holder["id"]}),
        )
        .await;
        create(
            &client,
            &format!("/books/{}/loan", book["id"]),
            json!({"member_id": returner["id"]}),
        )
        .await;
        let response = client
            .post(format!("{}/books/{}/return", BASE_URL, book["id"]))
            .json(&json!({"member_id": returner["id"]}))
            .send()
            .await
            .expect("Failed to return book");
        assert_eq!(response.status(), 200);

        let response = client
            .post(format!("{}/books/{}/return", BASE_URL, book["id"]))
            .json(&json!({"member_id": returner["id"]}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 400);

        // Well past every due date issued today
        let as_of = chrono::Utc::now().date_naive() + chrono::Days::new(365);
        let overdue: Vec<Value> = client
            .get(format!("{}/members/overdue?as_of={}", BASE_URL, as_of.format("%Y-%m-%d")))
            .send()
            .await
            .expect("Failed to fetch overdue members")
            .json()
            .await
            .expect("Failed to parse overdue members");
        let holder_row = overdue
            .iter()
            .find(|row| row["member_id"] == holder["id"])
            .expect("holder should be overdue");
        assert_eq!(holder_row["overdue_count"], 1);
        assert!(overdue.iter().all(|row| row["member_id"] != returner["id"]));

        let top: Vec<Value> = client
            .get(format!("{}/members/top-active", BASE_URL))
            .send()
            .await
            .expect("Failed to fetch top-active members")
            .json()
            .await
            .expect("Failed to parse top-active members");
        let returner_row = top
            .iter()
            .find(|row| row["member_id"] == returner["id"])
            .expect("returner should be listed");
        assert_eq!(returner_row["number_of_active_loans"], 1);
        assert!(top.iter().all(|row| row["member_id"] != holder["id"]));

        let response = client
            .delete(format!("{}/members/{}", BASE_URL, returner["id"]))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 409);
    }
}
