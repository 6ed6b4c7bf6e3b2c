//! End-to-end tests of the HTTP API against an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use greenweb::auth::SessionStore;
use greenweb::chatbot::TIPS;
use greenweb::config::Config;
use greenweb::server::{AppState, build_router};
use greenweb::storage::memory::MemoryStore;

fn app() -> Router {
    let config = Config::test_default(&std::env::temp_dir());
    let state = AppState::new(
        Arc::new(config),
        Arc::new(MemoryStore::new()),
        Arc::new(SessionStore::new(Duration::from_secs(3600))),
        None,
    )
    .unwrap();
    build_router(state)
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

async fn send(app: &Router, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    let req = match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    Reply { status, cookie, body }
}

/// Register `username` and return its session cookie.
async fn register(app: &Router, username: &str) -> String {
    let r = send(
        app,
        "POST",
        "/api/register",
        None,
        Some(json!({ "username": username, "password": "s3cret", "email": format!("{username}@example.com") })),
    )
    .await;
    assert_eq!(r.status, StatusCode::CREATED, "{:?}", r.body);
    r.cookie.expect("session cookie")
}

async fn analyze(app: &Router, cookie: &str, url: &str, hosting: &str) -> Value {
    let r = send(
        app,
        "POST",
        "/api/carbon/analyze",
        Some(cookie),
        Some(json!({
            "url": url,
            "hostingProvider": hosting,
            "monthlyTraffic": "100,001+ visitors",
            "pageSize": 2.0
        })),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK, "{:?}", r.body);
    r.body
}

// ── misc ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_backends() {
    let app = app();
    let r = send(&app, "GET", "/api/health", None, None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body["status"], "ok");
    assert_eq!(r.body["storage"], "memory");
    assert_eq!(r.body["llm"], "none");
}

#[tokio::test]
async fn root_and_favicon() {
    let app = app();
    let r = send(&app, "GET", "/", None, None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert!(r.body.as_str().unwrap().contains("GreenWeb"));
    assert_eq!(send(&app, "GET", "/favicon.ico", None, None).await.status, StatusCode::NO_CONTENT);
}

// ── auth ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_starts_a_session() {
    let app = app();
    let cookie = register(&app, "ada").await;
    assert!(cookie.starts_with("greenweb.sid="));

    let r = send(&app, "GET", "/api/user", Some(&cookie), None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body["username"], "ada");
    assert_eq!(r.body["name"], "ada");
    assert_eq!(r.body["role"], "user");
    assert!(r.body.get("passwordHash").is_none());
    assert!(r.body.get("password").is_none());
}

#[tokio::test]
async fn register_rejects_missing_and_duplicate_fields() {
    let app = app();
    let r = send(&app, "POST", "/api/register", None, Some(json!({ "username": "ada", "password": "x" }))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.body["error"], "bad_request");

    register(&app, "ada").await;
    let r = send(
        &app,
        "POST",
        "/api/register",
        None,
        Some(json!({ "username": "ada", "password": "x", "email": "other@example.com" })),
    )
    .await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.body["message"], "Username already exists");

    let r = send(
        &app,
        "POST",
        "/api/register",
        None,
        Some(json!({ "username": "bob", "password": "x", "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(r.body["message"], "Email already exists");
}

#[tokio::test]
async fn simultaneous_duplicate_registration_is_a_bad_request() {
    let app = app();
    let payload = || Some(json!({ "username": "ada", "password": "s3cret", "email": "ada@example.com" }));
    let (a, b) = tokio::join!(
        send(&app, "POST", "/api/register", None, payload()),
        send(&app, "POST", "/api/register", None, payload()),
    );

    let mut statuses = [a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);
    let loser = if a.status == StatusCode::BAD_REQUEST { a } else { b };
    assert_eq!(loser.body["message"], "Username already exists");
}

#[tokio::test]
async fn login_and_logout() {
    let app = app();
    register(&app, "ada").await;

    let r = send(&app, "POST", "/api/login", None, Some(json!({ "username": "ada", "password": "wrong" }))).await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
    assert_eq!(r.body["message"], "Invalid username or password");

    let r = send(&app, "POST", "/api/login", None, Some(json!({ "username": "ada", "password": "s3cret" }))).await;
    assert_eq!(r.status, StatusCode::OK);
    let cookie = r.cookie.unwrap();

    let r = send(&app, "POST", "/api/logout", Some(&cookie), None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.cookie.as_deref(), Some("greenweb.sid="));

    let r = send(&app, "GET", "/api/user", Some(&cookie), None).await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unauthenticated_requests_get_401() {
    let app = app();
    for (method, uri) in [
        ("GET", "/api/user"),
        ("GET", "/api/carbon/projects"),
        ("GET", "/api/gamification/badges"),
        ("GET", "/api/gamification/leaderboard"),
        ("GET", "/api/chatbot/messages"),
    ] {
        let r = send(&app, method, uri, None, None).await;
        assert_eq!(r.status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(r.body["message"], "Authentication required");
    }
    let r = send(&app, "GET", "/api/user", Some("greenweb.sid=forged"), None).await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_profile() {
    let app = app();
    let ada = register(&app, "ada").await;
    register(&app, "bob").await;

    let r = send(&app, "PATCH", "/api/user", Some(&ada), Some(json!({ "name": "" }))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.body["message"], "No valid fields to update");

    let r = send(&app, "PATCH", "/api/user", Some(&ada), Some(json!({ "email": "bob@example.com" }))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);

    let r = send(
        &app,
        "PATCH",
        "/api/user",
        Some(&ada),
        Some(json!({ "name": "Ada Lovelace", "profilePicture": "https://img.example/ada.png" })),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body["name"], "Ada Lovelace");
    assert_eq!(r.body["profilePicture"], "https://img.example/ada.png");
}

// ── carbon ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn analyze_creates_then_updates_project() {
    let app = app();
    let cookie = register(&app, "ada").await;

    let first = analyze(&app, &cookie, "https://example.com", "AWS").await;
    assert_eq!(first["carbonFootprint"], 1.2);
    assert_eq!(first["sustainabilityScore"], 77);
    assert_eq!(first["serverEfficiency"], 88);
    assert_eq!(first["assetOptimization"], 56);
    assert_eq!(first["greenHosting"], 94);
    assert_eq!(first["recommendations"].as_array().unwrap().len(), 3);
    let project_id = first["projectId"].as_i64().unwrap();

    // same site, different case → same project
    let second = analyze(&app, &cookie, "HTTPS://EXAMPLE.COM", "AWS").await;
    assert_eq!(second["projectId"].as_i64().unwrap(), project_id);

    let r = send(&app, "GET", "/api/carbon/projects", Some(&cookie), None).await;
    let projects = r.body.as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["name"], "example.com");
    assert_eq!(projects[0]["status"], "analyzed");
    assert_eq!(projects[0]["sustainabilityScore"], second["sustainabilityScore"]);

    let r = send(&app, "GET", &format!("/api/carbon/project/{project_id}"), Some(&cookie), None).await;
    assert_eq!(r.status, StatusCode::OK);
    let optimizations = r.body["optimizations"].as_array().unwrap();
    assert_eq!(optimizations.len(), 2);
    assert_eq!(r.body["latestOptimization"]["id"], optimizations[1]["id"]);
    assert_eq!(r.body["latestOptimization"]["category"], "analysis");
}

#[tokio::test]
async fn analyze_validates_input() {
    let app = app();
    let cookie = register(&app, "ada").await;
    let bad = [
        json!({ "hostingProvider": "AWS", "monthlyTraffic": "1-1,000 visitors" }),
        json!({ "url": "https://a.example", "monthlyTraffic": "1-1,000 visitors" }),
        json!({ "url": "://", "hostingProvider": "AWS", "monthlyTraffic": "1-1,000 visitors" }),
        json!({ "url": "https://a.example", "hostingProvider": "AWS", "monthlyTraffic": "1-1,000 visitors", "pageSize": -1 }),
    ];
    for body in bad {
        let r = send(&app, "POST", "/api/carbon/analyze", Some(&cookie), Some(body.clone())).await;
        assert_eq!(r.status, StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn scheme_less_url_is_accepted() {
    let app = app();
    let cookie = register(&app, "ada").await;
    let r = analyze(&app, &cookie, "example.org", "Other").await;
    let id = r["projectId"].as_i64().unwrap();
    let r = send(&app, "GET", &format!("/api/carbon/project/{id}"), Some(&cookie), None).await;
    assert_eq!(r.body["project"]["url"], "http://example.org");
    assert_eq!(r.body["project"]["description"], "Website at http://example.org");
}

#[tokio::test]
async fn project_access_rules() {
    let app = app();
    let ada = register(&app, "ada").await;
    let bob = register(&app, "bob").await;
    let id = analyze(&app, &ada, "https://example.com", "AWS").await["projectId"].as_i64().unwrap();
    let uri = format!("/api/carbon/project/{id}");

    assert_eq!(send(&app, "GET", &uri, Some(&bob), None).await.status, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, "DELETE", &uri, Some(&bob), None).await.status, StatusCode::FORBIDDEN);
    assert_eq!(send(&app, "GET", "/api/carbon/project/abc", Some(&ada), None).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, "GET", "/api/carbon/project/999", Some(&ada), None).await.status, StatusCode::NOT_FOUND);

    assert_eq!(send(&app, "DELETE", &uri, Some(&ada), None).await.status, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, "GET", &uri, Some(&ada), None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn project_detail_includes_latest_optimization() {
    let app = app();
    let ada = register(&app, "ada").await;
    let id = analyze(&app, &ada, "https://b.example", "Linode").await["projectId"].as_i64().unwrap();
    let r = send(&app, "GET", &format!("/api/carbon/project/{id}"), Some(&ada), None).await;
    assert!(r.body["optimizations"].is_array());
    assert!(r.body["latestOptimization"].is_object());
    assert_eq!(r.body["project"]["hostingProvider"], "Linode");
}

#[tokio::test]
async fn personal_calculator_is_public() {
    let app = app();
    let r = send(
        &app,
        "POST",
        "/api/carbon/calculate",
        None,
        Some(json!({ "electricity": 10, "transportType": "car", "distance": 20, "diet": "vegan" })),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body["success"], true);
    assert_eq!(r.body["result"]["total"], 10.83);
    assert_eq!(r.body["tips"].as_array().unwrap().len(), 8);

    let r = send(&app, "POST", "/api/carbon/calculate", None, Some(json!({ "electricity": -1 }))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn website_footprint_falls_back_to_default_size() {
    let app = app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let r = send(
        &app,
        "POST",
        "/api/carbon/website",
        None,
        Some(json!({ "url": format!("http://127.0.0.1:{port}/"), "monthlyViews": 0 })),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body["website_size_mb"], 2.0);
    assert_eq!(r.body["monthly_views"], 10_000);
    assert_eq!(r.body["carbon_per_visit"], 1.77);

    let r = send(&app, "POST", "/api/carbon/website", None, Some(json!({}))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
}

// ── gamification ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn green_high_scoring_project_earns_badges() {
    let app = app();
    let ada = register(&app, "ada").await;
    let bob = register(&app, "bob").await;
    let id = analyze(&app, &ada, "https://leaf.example", "Green Hosting Co.").await["projectId"]
        .as_i64()
        .unwrap();

    let r = send(&app, "POST", "/api/gamification/check-badges", Some(&ada), Some(json!({ "projectId": id }))).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body["hasNewBadges"], true);
    let names: Vec<&str> = r.body["newBadges"].as_array().unwrap().iter().map(|b| b["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Green Host Pioneer", "Carbon Reducer", "Speed Optimizer"]);

    let again = send(&app, "POST", "/api/gamification/check-badges", Some(&ada), Some(json!({ "projectId": id }))).await;
    assert_eq!(again.body["hasNewBadges"], false);
    assert_eq!(again.body["badges"].as_array().unwrap().len(), 3);

    let r = send(&app, "POST", "/api/gamification/check-badges", Some(&bob), Some(json!({ "projectId": id }))).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);
    let r = send(&app, "POST", "/api/gamification/check-badges", Some(&bob), Some(json!({}))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    let r = send(&app, "POST", "/api/gamification/check-badges", Some(&bob), Some(json!({ "projectId": 999 }))).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);

    let board = send(&app, "GET", "/api/gamification/leaderboard", Some(&bob), None).await.body;
    assert_eq!(board[0]["username"], "ada");
    assert_eq!(board[0]["points"], 275);
    assert_eq!(board[0]["sustainabilityScore"], 90);
    assert_eq!(board[1]["username"], "bob");
    assert_eq!(board[1]["points"], 0);

    let stats = send(&app, "GET", "/api/gamification/stats", Some(&ada), None).await.body;
    assert_eq!(stats["badgeCount"], 3);
    assert_eq!(stats["projectCount"], 1);
    assert_eq!(stats["totalPoints"], 275);
    assert_eq!(stats["totalCarbonSaved"], 18.0);
    assert_eq!(stats["recentProjects"].as_array().unwrap().len(), 1);

    let mine = send(&app, "GET", "/api/gamification/badges", Some(&ada), None).await.body;
    assert_eq!(mine.as_array().unwrap().len(), 3);
    let all = send(&app, "GET", "/api/gamification/badges/all", Some(&bob), None).await.body;
    assert_eq!(all.as_array().unwrap().len(), 6);
}

// ── chatbot ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chatbot_answers_with_fallback_and_keeps_history() {
    let app = app();
    let ada = register(&app, "ada").await;

    let r = send(
        &app,
        "POST",
        "/api/chatbot/messages",
        Some(&ada),
        Some(json!({ "content": "Which hosting should I pick?" })),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body["userMessage"]["role"], "user");
    assert_eq!(r.body["aiResponse"]["role"], "assistant");
    let reply = r.body["aiResponse"]["content"].as_str().unwrap();
    assert!(reply.starts_with("Server efficiency"));
    assert!(reply.contains("Recommendations:\n1. "));
    assert!(reply.contains("- Green Web Foundation: https://www.thegreenwebfoundation.org"));

    let history = send(&app, "GET", "/api/chatbot/messages", Some(&ada), None).await.body;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["content"], "Which hosting should I pick?");

    let r = send(&app, "POST", "/api/chatbot/messages", Some(&ada), Some(json!({ "content": "   " }))).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tip_is_public() {
    let app = app();
    let r = send(&app, "GET", "/api/chatbot/tip", None, None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert!(TIPS.contains(&r.body["tip"].as_str().unwrap()));
}
