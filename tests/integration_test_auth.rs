mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use common::{parse_body, TestApp, PASSWORD};
use serde_json::json;
use tower::ServiceExt;

fn reset_token_from(html: &str) -> String {
    let html = html.replace("&#x2F;", "/");
    let start = html.find("resetPassword/").expect("reset link in mail") + "resetPassword/".len();
    let end = html[start..].find('"').unwrap();
    html[start..start + end].to_string()
}

#[tokio::test]
async fn test_signup_sets_cookie_and_sends_welcome() {
    let app = TestApp::new().await;

    let res = app
        .request(
            "POST",
            "/api/v1/users/signup",
            None,
            Some(json!({
                "name": "Jonas Schmedtmann", "email": "jonas@example.com",
                "password": PASSWORD, "password_confirm": PASSWORD,
                "role": "admin"
            })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));

    let body = parse_body(res).await;
    assert_eq!(body["status"], "success");
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["data"]["user"]["role"], "user");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let mail = app.sent_mail();
    assert_eq!(mail.len(), 1);
    assert_eq!(mail[0].recipient, "jonas@example.com");
    assert!(mail[0].html_body.contains("Jonas"));
}

#[tokio::test]
async fn test_signup_accepts_camel_case_confirmation() {
    let app = TestApp::new().await;

    let res = app
        .request(
            "POST",
            "/api/v1/users/signup",
            None,
            Some(json!({
                "name": "Jonas", "email": "jonas@example.com",
                "password": PASSWORD, "passwordConfirm": PASSWORD
            })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    app.login("jonas@example.com", PASSWORD).await;
}

#[tokio::test]
async fn test_signup_validation() {
    let app = TestApp::new().await;

    let res = app
        .request(
            "POST",
            "/api/v1/users/signup",
            None,
            Some(json!({
                "name": "Jonas", "email": "jonas@example.com",
                "password": PASSWORD, "password_confirm": "different1"
            })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .request(
            "POST",
            "/api/v1/users/signup",
            None,
            Some(json!({ "name": "Jonas", "email": "not-an-email", "password": PASSWORD, "password_confirm": PASSWORD })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    app.signup("Jonas", "jonas@example.com").await;
    let res = app
        .request(
            "POST",
            "/api/v1/users/signup",
            None,
            Some(json!({ "name": "Other", "email": "jonas@example.com", "password": PASSWORD, "password_confirm": PASSWORD })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_signup_survives_mail_failure() {
    let app = TestApp::with_failing_mail().await;
    app.signup("Jonas", "jonas@example.com").await;
}

#[tokio::test]
async fn test_login() {
    let app = TestApp::new().await;
    app.signup("Jonas", "jonas@example.com").await;

    let res = app
        .request("POST", "/api/v1/users/login", None, Some(json!({ "email": "jonas@example.com", "password": "wrongpass" })))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(parse_body(res).await["message"], "Incorrect email or password");

    let res = app
        .request("POST", "/api/v1/users/login", None, Some(json!({ "email": "jonas@example.com" })))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let token = app.login("jonas@example.com", PASSWORD).await;
    let res = app.request("GET", "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(parse_body(res).await["data"]["data"]["email"], "jonas@example.com");
}

#[tokio::test]
async fn test_protect_accepts_cookie_and_rejects_garbage() {
    let app = TestApp::new().await;
    let (_, token) = app.signup("Jonas", "jonas@example.com").await;

    let res = app.request("GET", "/api/v1/users/me", None, None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(parse_body(res).await["message"], "You are not logged in! Please log in to get access.");

    let res = app.request("GET", "/api/v1/users/me", Some("not.a.jwt"), None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(parse_body(res).await["message"], "Invalid token. Please log in again!");

    let res = app.router.clone().oneshot(
        Request::builder()
            .uri("/api/v1/users/me")
            .header(header::COOKIE, format!("jwt={}", token))
            .body(Body::empty())
            .unwrap()
    ).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_overwrites_cookie() {
    let app = TestApp::new().await;

    let res = app.request("GET", "/api/v1/users/logout", None, None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("jwt=loggedout"));
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let app = TestApp::new().await;
    app.signup("Jonas", "jonas@example.com").await;

    let res = app
        .request("POST", "/api/v1/users/forgotPassword", None, Some(json!({ "email": "nobody@example.com" })))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .request("POST", "/api/v1/users/forgotPassword", None, Some(json!({ "email": "jonas@example.com" })))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(parse_body(res).await["message"], "Token sent to email!");

    let mail = app.sent_mail();
    let reset = mail.last().unwrap();
    assert!(reset.subject.contains("password reset"));
    let token = reset_token_from(&reset.html_body);

    let res = app
        .request(
            "PATCH",
            "/api/v1/users/resetPassword/not-the-token",
            None,
            Some(json!({ "password": "newpass123", "password_confirm": "newpass123" })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .request(
            "PATCH",
            &format!("/api/v1/users/resetPassword/{}", token),
            None,
            Some(json!({ "password": "newpass123", "passwordConfirm": "newpass123" })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(parse_body(res).await["token"].as_str().is_some());

    app.login("jonas@example.com", "newpass123").await;

    // The token is single use.
    let res = app
        .request(
            "PATCH",
            &format!("/api/v1/users/resetPassword/{}", token),
            None,
            Some(json!({ "password": "another123", "password_confirm": "another123" })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forgot_password_rolls_back_when_mail_fails() {
    let app = TestApp::with_failing_mail().await;
    let (id, _) = app.signup("Jonas", "jonas@example.com").await;

    let res = app
        .request("POST", "/api/v1/users/forgotPassword", None, Some(json!({ "email": "jonas@example.com" })))
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(parse_body(res).await["message"], "There was an error sending the email. Try again later!");

    let stored: Option<String> = sqlx::query_scalar("SELECT password_reset_token FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_update_my_password() {
    let app = TestApp::new().await;
    let (_, token) = app.signup("Jonas", "jonas@example.com").await;

    let res = app
        .request(
            "PATCH",
            "/api/v1/users/updateMyPassword",
            Some(&token),
            Some(json!({ "password_current": "wrongpass", "password": "newpass123", "password_confirm": "newpass123" })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(parse_body(res).await["message"], "Your current password is wrong.");

    let res = app
        .request(
            "PATCH",
            "/api/v1/users/updateMyPassword",
            Some(&token),
            Some(json!({ "passwordCurrent": PASSWORD, "password": "newpass123", "passwordConfirm": "newpass123" })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    app.login("jonas@example.com", "newpass123").await;
}

#[tokio::test]
async fn test_password_change_invalidates_older_tokens() {
    let app = TestApp::new().await;
    let (id, _) = app.signup("Jonas", "jonas@example.com").await;
    let old_token = app
        .state
        .auth_service
        .issue_token_at(&id, Utc::now() - Duration::seconds(30))
        .unwrap();

    let res = app.request("GET", "/api/v1/users/me", Some(&old_token), None).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .request(
            "PATCH",
            "/api/v1/users/updateMyPassword",
            Some(&old_token),
            Some(json!({ "password_current": PASSWORD, "password": "newpass123", "password_confirm": "newpass123" })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let new_token = parse_body(res).await["token"].as_str().unwrap().to_string();

    let res = app.request("GET", "/api/v1/users/me", Some(&old_token), None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(parse_body(res).await["message"], "User recently changed password! Please log in again.");

    let res = app.request("GET", "/api/v1/users/me", Some(&new_token), None).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_reset_token_is_rejected() {
    let app = TestApp::new().await;
    let (id, _) = app.signup("Jonas", "jonas@example.com").await;

    let res = app
        .request("POST", "/api/v1/users/forgotPassword", None, Some(json!({ "email": "jonas@example.com" })))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let token = reset_token_from(&app.sent_mail().last().unwrap().html_body);

    sqlx::query("UPDATE users SET password_reset_expires = ? WHERE id = ?")
        .bind(Utc::now() - Duration::minutes(1))
        .bind(&id)
        .execute(&app.pool)
        .await
        .unwrap();

    let res = app
        .request(
            "PATCH",
            &format!("/api/v1/users/resetPassword/{}", token),
            None,
            Some(json!({ "password": "newpass123", "password_confirm": "newpass123" })),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(parse_body(res).await["message"], "Token is invalid or has expired");

    app.login("jonas@example.com", PASSWORD).await;
}
