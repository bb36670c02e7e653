use axum::{
    extract::{FromRequestParts, FromRef},
    http::request::Parts,
};
use crate::api::middleware::auth::JWT_COOKIE;
use crate::domain::models::user::User;
use crate::state::AppState;
use std::convert::Infallible;
use std::sync::Arc;
use tower_cookies::Cookies;
use tracing::debug;

/// Lenient variant for rendered pages: never rejects, a bad or missing
/// cookie simply means nobody is logged in.
pub struct MaybeAuthUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(cookies) = parts.extensions.get::<Cookies>() else {
            return Ok(MaybeAuthUser(None));
        };
        let Some(token) = cookies.get(JWT_COOKIE).map(|c| c.value().to_string()) else {
            return Ok(MaybeAuthUser(None));
        };

        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);
        match app_state.auth_service.authenticate(&token).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(e) => {
                debug!("MaybeAuth: treating request as guest: {}", e);
                Ok(MaybeAuthUser(None))
            }
        }
    }
}
