use axum::{extract::FromRequest, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use crate::error::AppError;

/// `Json` whose rejections use the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl<T: Serialize> IntoResponse for AppJson<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}
