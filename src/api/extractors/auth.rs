use axum::{extract::FromRequestParts, http::request::Parts};
use crate::domain::models::user::User;
use crate::error::AppError;

pub const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";

/// The user resolved by the `protect` stage. Only usable on routes behind it.
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<User>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized(NOT_LOGGED_IN.into()))
    }
}
