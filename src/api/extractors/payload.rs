use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde::de::DeserializeOwned;
use crate::api::extractors::json::AppJson;
use crate::error::AppError;

/// Update bodies that may carry file uploads: JSON, or `multipart/form-data`.
pub enum JsonOrMultipart<T> {
    Json(T),
    Multipart(Multipart),
}

impl<S, T> FromRequest<S> for JsonOrMultipart<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            Ok(Self::Multipart(Multipart::from_request(req, state).await?))
        } else {
            let AppJson(body) = AppJson::<T>::from_request(req, state).await?;
            Ok(Self::Json(body))
        }
    }
}
