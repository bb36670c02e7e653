use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tower_cookies::{Cookie, Cookies};
use tracing::{error, info, warn};

use crate::api::dtos::requests::{
    ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, UpdatePasswordRequest,
};
use crate::api::dtos::responses::{MessageResponse, TokenResponse, UserData};
use crate::api::extractors::{auth::AuthUser, json::AppJson};
use crate::api::middleware::auth::JWT_COOKIE;
use crate::domain::models::user::{SignupRequest, User};
use crate::error::AppError;
use crate::state::AppState;

const LOGGED_OUT: &str = "loggedout";
const EMAIL_FAILED: &str = "There was an error sending the email. Try again later!";

pub async fn signup(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<Response, AppError> {
    let user = state.auth_service.signup(payload).await?;

    let url = format!("{}/me", state.config.public_url);
    if let Err(e) = state.notifications.send_welcome(&user, &url).await {
        warn!("Welcome mail for {} not sent: {}", user.id, e);
    }

    send_token(&state, &cookies, user, StatusCode::CREATED)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Response, AppError> {
    let user = state.auth_service.login(&payload.email, &payload.password).await?;

    info!("User logged in: {}", user.id);
    send_token(&state, &cookies, user, StatusCode::OK)
}

pub async fn logout(cookies: Cookies) -> impl IntoResponse {
    let cookie = Cookie::build((JWT_COOKIE, LOGGED_OUT))
        .http_only(true)
        .path("/")
        .expires(OffsetDateTime::now_utc() + Duration::seconds(10))
        .build();
    cookies.add(cookie);

    Json(serde_json::json!({ "status": "success" }))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (mut user, reset) = state.auth_service.start_password_reset(&payload.email).await?;

    let url = format!("{}/api/v1/users/resetPassword/{}", state.config.public_url, reset.token);
    if let Err(e) = state.notifications.send_password_reset(&user, &url).await {
        error!("Password reset mail for {} failed: {}", user.id, e);
        state.auth_service.cancel_password_reset(&mut user).await?;
        return Err(AppError::ExternalService(EMAIL_FAILED.into()));
    }

    Ok(Json(MessageResponse::success("Token sent to email!")))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(token): Path<String>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Response, AppError> {
    let user = state
        .auth_service
        .reset_password(&token, &payload.password, &payload.password_confirm)
        .await?;

    send_token(&state, &cookies, user, StatusCode::OK)
}

pub async fn update_my_password(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<UpdatePasswordRequest>,
) -> Result<Response, AppError> {
    let user = state
        .auth_service
        .change_password(&user.id, &payload.password_current, &payload.password, &payload.password_confirm)
        .await?;

    send_token(&state, &cookies, user, StatusCode::OK)
}

/// Issues a token for `user`, sets it as the `jwt` cookie and returns it
/// with the user in the body.
pub fn send_token(state: &AppState, cookies: &Cookies, user: User, status: StatusCode) -> Result<Response, AppError> {
    let token = set_jwt_cookie(state, cookies, &user)?;

    Ok((
        status,
        Json(TokenResponse {
            status: "success",
            token,
            data: UserData { user },
        }),
    )
        .into_response())
}

pub fn set_jwt_cookie(state: &AppState, cookies: &Cookies, user: &User) -> Result<String, AppError> {
    let token = state.auth_service.issue_token(&user.id)?;

    let cookie = Cookie::build((JWT_COOKIE, token.clone()))
        .http_only(true)
        .secure(state.config.environment.is_production())
        .path("/")
        .expires(OffsetDateTime::now_utc() + Duration::days(state.config.jwt_cookie_expires_in_days))
        .build();
    cookies.add(cookie);

    Ok(token)
}
