use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

pub const TOO_MANY_REQUESTS: &str = "Too many requests from this IP, please try again in an hour!";

/// Per-IP quota for the JSON API and the credential forms.
pub async fn limit_by_ip(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&req, state.config.trust_proxy);

    if state.rate_limiter.check_key(&ip).is_err() {
        warn!("Rate limit exceeded for {}", ip);
        return Err(AppError::TooManyRequests(TOO_MANY_REQUESTS.into()));
    }

    Ok(next.run(req).await)
}

/// The peer address. The first `X-Forwarded-For` hop is only honoured when
/// the service is configured to trust its proxy.
fn client_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    let forwarded = trust_proxy
        .then(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse().ok())
        })
        .flatten();

    forwarded
        .or_else(|| req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
