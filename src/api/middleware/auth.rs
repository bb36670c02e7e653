use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use tower_cookies::Cookies;
use tracing::{debug, Span};

use crate::api::extractors::auth::NOT_LOGGED_IN;
use crate::domain::models::user::{Role, User};
use crate::error::AppError;
use crate::state::AppState;

pub const JWT_COOKIE: &str = "jwt";
pub const FORBIDDEN: &str = "You do not have permission to perform this action";

pub const ADMIN: &[Role] = &[Role::Admin];
pub const ADMIN_OR_LEAD: &[Role] = &[Role::Admin, Role::LeadGuide];
pub const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];
pub const CUSTOMER: &[Role] = &[Role::User];
pub const CUSTOMER_OR_ADMIN: &[Role] = &[Role::User, Role::Admin];

/// Resolves the caller from `Authorization: Bearer` or the `jwt` cookie
/// and stores the [`User`] in the request extensions.
pub async fn protect(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .or_else(|| cookies.get(JWT_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| AppError::Unauthorized(NOT_LOGGED_IN.into()))?;

    let user = state.auth_service.authenticate(&token).await?;

    Span::current().record("user_id", user.id.as_str());
    Span::current().record("user_role", user.role.as_str());

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Role gate for routes behind [`protect`].
pub fn restrict_to(
    roles: &'static [Role],
) -> impl Fn(Request, Next) -> BoxFuture<'static, Result<Response, AppError>> + Clone + Send + Sync + 'static {
    move |req, next| Box::pin(check_role(roles, req, next))
}

async fn check_role(roles: &'static [Role], req: Request, next: Next) -> Result<Response, AppError> {
    let role = req.extensions().get::<User>().and_then(User::role);

    match role {
        Some(role) if roles.contains(&role) => Ok(next.run(req).await),
        Some(role) => {
            debug!("Role {} rejected, route needs one of {:?}", role, roles);
            Err(AppError::Forbidden(FORBIDDEN.into()))
        }
        None => Err(AppError::Unauthorized(NOT_LOGGED_IN.into())),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_bearer_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }
}
