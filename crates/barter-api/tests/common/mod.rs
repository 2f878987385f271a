#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use barter_api::{AppStateInner, Settings, router};
use barter_db::Database;

pub const PASSWORD: &str = "barter-pass-1";

pub fn app() -> Router {
    let db = Database::open_in_memory().expect("in-memory database");
    let mut settings = Settings::new("integration-test-secret");
    settings.page_size = 3;
    router(AppStateInner::new(db, settings))
}

pub async fn call(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.expect("router is infallible")
}

pub async fn body_text(res: Response<Body>) -> String {
    let bytes = res.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Send a JSON request and decode the JSON reply. Empty bodies decode to `null`.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let res = call(app, req).await;
    let status = res.status();
    let text = body_text(res).await;
    let value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).expect("json body")
    };
    (status, value)
}

/// Register `username` and return an access token for it.
pub async fn signup(app: &Router, username: &str) -> String {
    let (status, _) = send(
        app,
        "POST",
        "/auth/users/",
        None,
        Some(json!({ "username": username, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {}", username);

    let (status, tokens) = send(
        app,
        "POST",
        "/auth/jwt/create/",
        None,
        Some(json!({ "username": username, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    tokens["access"].as_str().expect("access token").to_string()
}

/// Create an ad and return its id.
pub async fn post_ad(app: &Router, token: &str, title: &str, category: &str) -> i64 {
    let (status, ad) = send(
        app,
        "POST",
        "/api/ads/",
        Some(token),
        Some(json!({
            "title": title,
            "description": format!("{} в хорошем состоянии", title),
            "category": category,
            "condition": "used",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", ad);
    ad["id"].as_i64().expect("ad id")
}

/// Propose `sender` for `receiver` and return the proposal id.
pub async fn propose(app: &Router, token: &str, sender: i64, receiver: i64) -> i64 {
    let (status, proposal) = send(
        app,
        "POST",
        "/api/proposals/",
        Some(token),
        Some(json!({ "ad_sender_id": sender, "ad_receiver": receiver, "comment": "Меняю?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", proposal);
    proposal["id"].as_i64().expect("proposal id")
}
