use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tracing::error;

use crate::error::{ErrorDetail, GENERIC_ERROR_MESSAGE};
use crate::state::AppState;

/// Development only: surfaces the detail of unexpected failures that the
/// error type keeps out of the body.
pub async fn expose_error_details(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if state.config.environment.is_production() {
        return response;
    }

    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let status = response.status();
    (
        status,
        Json(json!({ "status": "error", "message": GENERIC_ERROR_MESSAGE, "error": detail })),
    )
        .into_response()
}

/// Panics in handlers end as the generic 500 body.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("💥 Handler panicked: {}", detail);

    (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": "error", "message": GENERIC_ERROR_MESSAGE })),
    )
        .into_response()
}
