//! Generic CRUD handlers shared by every resource.
//!
//! Each entity opts in by implementing [`Resource`]; routes then mount
//! `get_all::<Tour>`, `update_one::<Review>` and so on. The `*_record`
//! functions hold the behaviour so that specialised handlers (nested
//! reviews, multipart tour updates, `/me`) can reuse it.

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::api::dtos::responses::Envelope;
use crate::api::extractors::{json::AppJson, query::AppQuery};
use crate::domain::models::{Document, Validate};
use crate::domain::ports::ResourceRepository;
use crate::domain::services::api_features::{build_list_query, project, QueryParams};
use crate::error::AppError;
use crate::state::AppState;

#[async_trait]
pub trait Resource: Document + Sized {
    fn repository(state: &AppState) -> Arc<dyn ResourceRepository<Self>>;

    /// Embeds related documents into a single-record response.
    async fn populate(_state: &AppState, record: Self::Record) -> Result<Value, AppError> {
        to_json(&record)
    }

    /// Runs after a create, update or delete succeeded.
    async fn after_write(_state: &AppState, _record: &Self::Record) -> Result<(), AppError> {
        Ok(())
    }
}

/// A parent filter for nested routes: `(column, parent id)`.
pub type Scope<'a> = Option<(&'static str, &'a str)>;

pub async fn get_all<R: Resource>(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<QueryParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(list_records::<R>(&state, &params, None).await?))
}

pub async fn get_one<R: Resource>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(Envelope::one(fetch_one::<R>(&state, &id).await?)))
}

pub async fn create_one<R>(
    State(state): State<Arc<AppState>>,
    AppJson(input): AppJson<R::Create>,
) -> Result<impl IntoResponse, AppError>
where
    R: Resource,
    R::Create: DeserializeOwned + Validate,
{
    let record = create_record::<R>(&state, input).await?;
    Ok((StatusCode::CREATED, Json(Envelope::one(record))))
}

pub async fn update_one<R>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(patch): AppJson<R::Update>,
) -> Result<impl IntoResponse, AppError>
where
    R: Resource,
    R::Update: DeserializeOwned,
{
    let record = update_record::<R>(&state, &id, patch).await?;
    Ok(Json(Envelope::one(record)))
}

pub async fn delete_one<R: Resource>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    delete_record::<R>(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Query Builder, optional parent scope, then projection of each record.
pub async fn list_records<R: Resource>(
    state: &AppState,
    params: &[(String, String)],
    scope: Scope<'_>,
) -> Result<Envelope<Vec<Value>>, AppError> {
    let mut query = build_list_query(params, R::FIELDS)?;
    if let Some((column, parent_id)) = scope {
        query = query.scoped_to(column, parent_id);
    }

    let records = R::repository(state).find_all(&query).await?;
    let data = records
        .iter()
        .map(|record| to_json(record).map(|value| project(value, &query.projection)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Envelope::many(data))
}

pub async fn fetch_one<R: Resource>(state: &AppState, id: &str) -> Result<Value, AppError> {
    let record = R::repository(state).find_by_id(id).await?.ok_or_else(not_found::<R>)?;
    R::populate(state, record).await
}

pub async fn create_record<R>(state: &AppState, input: R::Create) -> Result<R::Record, AppError>
where
    R: Resource,
    R::Create: Validate,
{
    input.validate()?;
    let record = R::repository(state).create(&input).await?;
    R::after_write(state, &record).await?;

    info!("Created {}", R::NAME);
    Ok(record)
}

pub async fn update_record<R: Resource>(state: &AppState, id: &str, patch: R::Update) -> Result<R::Record, AppError> {
    let record = R::repository(state).update(id, patch).await?.ok_or_else(not_found::<R>)?;
    R::after_write(state, &record).await?;

    info!("Updated {} {}", R::NAME, id);
    Ok(record)
}

pub async fn delete_record<R: Resource>(state: &AppState, id: &str) -> Result<R::Record, AppError> {
    let record = R::repository(state).delete(id).await?.ok_or_else(not_found::<R>)?;
    R::after_write(state, &record).await?;

    info!("Deleted {} {}", R::NAME, id);
    Ok(record)
}

pub fn not_found<R: Document>() -> AppError {
    AppError::NotFound(format!("No {} found with that ID", R::NAME))
}

pub fn to_json<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::InternalWithMsg(format!("Serialization failed: {}", e)))
}
