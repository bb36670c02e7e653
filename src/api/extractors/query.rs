use axum::extract::FromRequestParts;
use crate::error::AppError;

/// `Query` whose rejections use the API error shape.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
