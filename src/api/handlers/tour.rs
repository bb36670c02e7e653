use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::api::dtos::responses::Envelope;
use crate::api::extractors::{payload::JsonOrMultipart, query::AppQuery};
use crate::api::handlers::factory::{list_records, not_found, to_json, update_record, Resource};
use crate::api::handlers::upload::{read_multipart, MultipartBody};
use crate::domain::models::tour::{Tour, TourPatch};
use crate::domain::models::Patch;
use crate::domain::ports::ResourceRepository;
use crate::domain::services::{
    api_features::QueryParams,
    geo::{distances_from, tours_within, Point, Unit},
    reporting::{monthly_plan, STATS_MIN_RATING},
};
use crate::error::AppError;
use crate::state::AppState;

const COVER_SIZE: (u32, u32) = (2000, 1333);
const MAX_GALLERY_IMAGES: usize = 3;

#[async_trait]
impl Resource for Tour {
    fn repository(state: &AppState) -> Arc<dyn ResourceRepository<Self>> {
        state.tours.clone()
    }

    async fn populate(state: &AppState, tour: Tour) -> Result<Value, AppError> {
        let reviews = state.review_repo.find_by_tour(&tour.id).await?;
        let mut value = to_json(&tour)?;
        if let Value::Object(map) = &mut value {
            map.insert("reviews".into(), to_json(&reviews)?);
        }
        Ok(value)
    }
}

/// `top-5-cheap`: the best rated, cheapest five tours in card form.
pub async fn top_5_cheap(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<QueryParams>,
) -> Result<impl IntoResponse, AppError> {
    let params = with_overrides(params, &[
        ("limit", "5"),
        ("sort", "-ratings_average,price"),
        ("fields", "name,price,ratings_average,difficulty,summary"),
    ]);
    Ok(Json(list_records::<Tour>(&state, &params, None).await?))
}

fn with_overrides(mut params: QueryParams, overrides: &[(&str, &str)]) -> QueryParams {
    params.retain(|(key, _)| !overrides.iter().any(|(k, _)| k == key));
    params.extend(overrides.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    params
}

pub async fn tour_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let stats = state.tour_repo.stats_by_difficulty(STATS_MIN_RATING).await?;
    Ok(Json(json!({ "status": "success", "data": { "stats": stats } })))
}

pub async fn get_monthly_plan(
    State(state): State<Arc<AppState>>,
    Path(year): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let year: i32 = year
        .parse()
        .map_err(|_| AppError::Validation(format!("'{}' is not a valid year", year)))?;

    let tours = state.tour_repo.list_visible().await?;
    let plan = monthly_plan(&tours, year);
    Ok(Json(json!({ "status": "success", "data": { "plan": plan } })))
}

pub async fn get_tours_within(
    State(state): State<Arc<AppState>>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let radius: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AppError::Validation(format!("'{}' is not a valid distance", distance)))?;
    let center = Point::parse(&latlng)?;
    let unit = Unit::parse(&unit)?;

    let tours = tours_within(state.tour_repo.list_visible().await?, center, radius, unit);
    Ok(Json(Envelope::many(tours)))
}

pub async fn get_distances(
    State(state): State<Arc<AppState>>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let origin = Point::parse(&latlng)?;
    let unit = Unit::parse(&unit)?;

    let tours = state.tour_repo.list_visible().await?;
    Ok(Json(Envelope::many(distances_from(&tours, origin, unit))))
}

/// PATCH with either a JSON body or a form carrying `imageCover` and up to
/// three `images`.
pub async fn update_tour(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: JsonOrMultipart<TourPatch>,
) -> Result<impl IntoResponse, AppError> {
    let patch = match body {
        JsonOrMultipart::Json(patch) => patch,
        JsonOrMultipart::Multipart(multipart) => {
            let form = read_multipart(multipart, &[("imageCover", 1), ("images", MAX_GALLERY_IMAGES)]).await?;
            let mut patch: TourPatch = form.fields_as()?;
            // Images are only written for a tour that exists and will accept the patch.
            let tour = Tour::repository(&state).find_by_id(&id).await?.ok_or_else(not_found::<Tour>)?;
            patch.clone().apply(&mut tour.clone())?;
            store_tour_images(&state, &id, &form, &mut patch).await?;
            patch
        }
    };

    let tour = update_record::<Tour>(&state, &id, patch).await?;
    Ok(Json(Envelope::one(tour)))
}

/// Resizes every uploaded image concurrently and points the patch at the
/// stored files.
async fn store_tour_images(
    state: &AppState,
    tour_id: &str,
    form: &MultipartBody,
    patch: &mut TourPatch,
) -> Result<(), AppError> {
    let timestamp = Utc::now().timestamp_millis();
    let mut jobs = Vec::new();

    if let Some(cover) = form.files_named("imageCover").next() {
        let filename = format!("tour-{}-{}-cover.jpeg", tour_id, timestamp);
        patch.image_cover = Some(filename.clone());
        jobs.push((cover, filename));
    }

    let gallery: Vec<String> = form
        .files_named("images")
        .enumerate()
        .map(|(i, file)| {
            let filename = format!("tour-{}-{}-{}.jpeg", tour_id, timestamp, i + 1);
            jobs.push((file, filename.clone()));
            filename
        })
        .collect();
    if !gallery.is_empty() {
        patch.images = Some(gallery);
    }

    let (width, height) = COVER_SIZE;
    let stored = try_join_all(jobs.into_iter().map(|(file, filename)| async move {
        state
            .image_store
            .save_jpeg(file.data.clone(), width, height, &format!("img/tours/{}", filename))
            .await
    }))
    .await?;

    if !stored.is_empty() {
        info!("Stored {} images for tour {}", stored.len(), tour_id);
    }
    Ok(())
}
