mod common;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
};
use common::{body_text, parse_body, tour_json, TestApp, PASSWORD};
use serde_json::json;
use std::net::SocketAddr;
use tower::ServiceExt;

async fn get_page(app: &TestApp, uri: &str, token: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("jwt={}", token));
    }
    app.router.clone().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
}

#[tokio::test]
async fn test_overview_and_tour_pages() {
    let app = TestApp::new().await;
    let (_, admin) = app.signup_as("admin", "admin@example.com").await;
    app.create_tour(&admin, tour_json("The Forest Hiker", 397.0, "easy", 5)).await;
    let mut secret = tour_json("The Hidden Valley", 997.0, "difficult", 3);
    secret["secret_tour"] = json!(true);
    app.create_tour(&admin, secret).await;

    let res = get_page(&app, "/", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    let html = body_text(res).await;
    assert!(html.contains("The Forest Hiker"));
    assert!(!html.contains("The Hidden Valley"));
    assert!(html.contains("Log in"));

    let res = get_page(&app, "/tour/the-forest-hiker", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("The Forest Hiker"));

    let res = get_page(&app, "/tour/the-hidden-valley", None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let html = body_text(res).await;
    assert!(html.contains("Something went wrong!"));
    assert!(html.contains("There is no tour with that name."));
}

#[tokio::test]
async fn test_browser_login_sets_cookie_and_redirects() {
    let app = TestApp::new().await;
    app.signup("Jonas Schmedtmann", "jonas@example.com").await;

    let res = get_page(&app, "/login", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Log into your account"));

    let res = app.router.clone().oneshot(
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("email=jonas%40example.com&password={}", PASSWORD)))
            .unwrap()
    ).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()[header::LOCATION], "/");
    let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    let token = cookie.trim_start_matches("jwt=").split(';').next().unwrap().to_string();

    let res = get_page(&app, "/", Some(&token)).await;
    assert!(body_text(res).await.contains("Jonas"));

    let res = app.router.clone().oneshot(
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("email=jonas%40example.com&password=wrongpass"))
            .unwrap()
    ).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(res).await.contains("Incorrect email or password"));
}

#[tokio::test]
async fn test_account_pages_need_login() {
    let app = TestApp::new().await;
    let (id, token) = app.signup("Jonas", "jonas@example.com").await;

    let res = get_page(&app, "/me", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(res).await.contains("You are not logged in!"));

    let res = get_page(&app, "/me", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("jonas@example.com"));

    let res = get_page(&app, "/my-tours", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("You have not booked any tours yet."));

    let res = app.router.clone().oneshot(
        Request::builder()
            .method("POST")
            .uri("/submit-user-data")
            .header(header::COOKIE, format!("jwt={}", token))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=Jonas+Renamed&email=renamed%40example.com"))
            .unwrap()
    ).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Jonas Renamed"));

    let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(email, "renamed@example.com");
}

#[tokio::test]
async fn test_security_headers_and_unknown_routes() {
    let app = TestApp::new().await;

    let res = app.request("GET", "/health", None, None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert!(res.headers().contains_key("content-security-policy"));

    let res = app.request("GET", "/api/v1/nothing-here", None, None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = parse_body(res).await;
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Can't find /api/v1/nothing-here on this server!");

    let res = app.request("POST", "/definitely/not/here", None, Some(json!({}))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_json_is_rejected() {
    let app = TestApp::new().await;
    let padding = "x".repeat(20 * 1024);

    let res = app
        .request("POST", "/api/v1/users/login", None, Some(json!({ "email": padding, "password": "p" })))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(parse_body(res).await["message"].as_str().unwrap().contains("length limit exceeded"));
}

async fn get_from(app: &TestApp, uri: &str, peer: [u8; 4], forwarded: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(forwarded) = forwarded {
        builder = builder.header("X-Forwarded-For", forwarded);
    }
    let mut req = builder.body(Body::empty()).unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from((peer, 4000))));
    app.router.clone().oneshot(req).await.unwrap()
}

#[tokio::test]
async fn test_api_rate_limit_per_ip() {
    let app = TestApp::with_config(|config| config.rate_limit_per_hour = 3).await;

    for _ in 0..3 {
        let res = get_from(&app, "/api/v1/tours", [192, 0, 2, 1], None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = get_from(&app, "/api/v1/tours", [192, 0, 2, 1], None).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        parse_body(res).await["message"],
        "Too many requests from this IP, please try again in an hour!"
    );

    // A made-up forwarding header does not buy a fresh budget.
    let res = get_from(&app, "/api/v1/tours", [192, 0, 2, 1], Some("198.51.100.9")).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another peer has its own budget.
    let res = get_from(&app, "/api/v1/tours", [192, 0, 2, 2], None).await;
    assert_eq!(res.status(), StatusCode::OK);

    // Pages are not limited.
    let res = get_from(&app, "/", [192, 0, 2, 1], None).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_behind_trusted_proxy() {
    let app = TestApp::with_config(|config| {
        config.rate_limit_per_hour = 1;
        config.trust_proxy = true;
    })
    .await;
    let proxy = [10, 0, 0, 1];

    let res = get_from(&app, "/api/v1/tours", proxy, Some("203.0.113.7")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = get_from(&app, "/api/v1/tours", proxy, Some("203.0.113.7, 10.0.0.1")).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    let res = get_from(&app, "/api/v1/tours", proxy, Some("203.0.113.8")).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_form_is_rate_limited() {
    let app = TestApp::with_config(|config| config.rate_limit_per_hour = 2).await;
    app.signup("Jonas", "jonas@example.com").await;

    let mut statuses = Vec::new();
    for _ in 0..4 {
        let mut req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("email=jonas%40example.com&password=wrongpass"))
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 50], 4000))));
        statuses.push(app.router.clone().oneshot(req).await.unwrap().status());
    }

    assert_eq!(
        statuses,
        vec![
            StatusCode::UNAUTHORIZED,
            StatusCode::UNAUTHORIZED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}
