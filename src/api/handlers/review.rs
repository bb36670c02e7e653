use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::api::dtos::{requests::CreateReviewRequest, responses::Envelope};
use crate::api::extractors::{auth::AuthUser, json::AppJson, query::AppQuery};
use crate::api::handlers::factory::{create_record, list_records, Resource};
use crate::domain::models::review::{NewReview, Review, ReviewWithAuthor};
use crate::domain::models::user::User;
use crate::domain::ports::ResourceRepository;
use crate::domain::services::{api_features::QueryParams, rating_service::recalculate_tour_ratings};
use crate::error::AppError;
use crate::state::AppState;

#[async_trait]
impl Resource for Review {
    fn repository(state: &AppState) -> Arc<dyn ResourceRepository<Self>> {
        state.reviews.clone()
    }

    /// Keeps the tour's rating aggregates in step with its reviews.
    async fn after_write(state: &AppState, record: &ReviewWithAuthor) -> Result<(), AppError> {
        recalculate_tour_ratings(state.review_repo.as_ref(), state.tour_repo.as_ref(), &record.review.tour_id).await
    }
}

/// `GET /tours/{id}/reviews`
pub async fn list_tour_reviews(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<String>,
    AppQuery(params): AppQuery<QueryParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(list_records::<Review>(&state, &params, Some(("r.tour_id", tour_id.as_str()))).await?))
}

/// `POST /reviews`: the tour comes from the body.
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tour_id = payload.tour_id.clone().unwrap_or_default();
    create_for(&state, &user, tour_id, payload).await
}

/// `POST /tours/{id}/reviews`: the tour comes from the path.
pub async fn create_tour_review(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(tour_id): Path<String>,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    create_for(&state, &user, tour_id, payload).await
}

/// The author is always the caller.
async fn create_for(
    state: &AppState,
    user: &User,
    tour_id: String,
    payload: CreateReviewRequest,
) -> Result<(StatusCode, Json<Envelope<ReviewWithAuthor>>), AppError> {
    let input = NewReview {
        review: payload.review.unwrap_or_default(),
        rating: payload.rating.unwrap_or_default(),
        tour_id,
        user_id: user.id.clone(),
    };

    let review = create_record::<Review>(state, input).await?;
    Ok((StatusCode::CREATED, Json(Envelope::one(review))))
}
