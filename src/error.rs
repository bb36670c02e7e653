use axum::{
    extract::multipart::MultipartRejection,
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::errors::ErrorKind;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const GENERIC_ERROR_MESSAGE: &str = "Something went very wrong!";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    TooManyRequests(String),
    #[error("{0}")]
    ExternalService(String),
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Internal server error")]
    Internal,
    #[error("Internal server error: {0}")]
    InternalWithMsg(String),
}

/// Detail of an unexpected failure, attached to the response so a
/// development-only stage can surface it.
#[derive(Clone, Debug)]
pub struct ErrorDetail(pub String);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(e) => match e.as_database_error() {
                Some(db_err) if db_err.is_unique_violation() => StatusCode::CONFLICT,
                Some(db_err) if db_err.is_foreign_key_violation() || db_err.is_check_violation() => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::ExternalService(_) | AppError::Internal | AppError::InternalWithMsg(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message that is safe to hand to the client. `None` for failures
    /// that are not expected to happen.
    pub fn client_message(&self) -> Option<String> {
        match self {
            AppError::Database(e) => match e.as_database_error() {
                Some(db_err) if db_err.is_unique_violation() => {
                    Some("Duplicate field value. Please use another value!".to_string())
                }
                Some(db_err) if db_err.is_foreign_key_violation() => {
                    Some("Referenced document does not exist.".to_string())
                }
                Some(db_err) if db_err.is_check_violation() => Some("Invalid input data.".to_string()),
                _ => None,
            },
            AppError::Token(e) => Some(match e.kind() {
                ErrorKind::ExpiredSignature => "Your token has expired! Please log in again.".to_string(),
                _ => "Invalid token. Please log in again!".to_string(),
            }),
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::Validation(msg)
            | AppError::TooManyRequests(msg)
            | AppError::ExternalService(msg) => Some(msg.clone()),
            AppError::Internal | AppError::InternalWithMsg(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = if status.is_client_error() { "fail" } else { "error" };

        match self.client_message() {
            Some(message) => (status, Json(json!({ "status": kind, "message": message }))).into_response(),
            None => {
                error!("Unexpected error: {:?}", self);
                let mut response = (
                    status,
                    Json(json!({ "status": kind, "message": GENERIC_ERROR_MESSAGE })),
                )
                    .into_response();
                response.extensions_mut().insert(ErrorDetail(self.to_string()));
                response
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Validation(err.body_text())
    }
}
