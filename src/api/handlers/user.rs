use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::api::dtos::{requests::UpdateMeRequest, responses::Envelope};
use crate::api::extractors::{auth::AuthUser, payload::JsonOrMultipart};
use crate::api::handlers::factory::{delete_record, fetch_one, update_record, Resource};
use crate::api::handlers::upload::read_multipart;
use crate::domain::models::user::{User, UserPatch};
use crate::domain::models::Patch;
use crate::domain::ports::ResourceRepository;
use crate::error::AppError;
use crate::state::AppState;

const PHOTO_SIZE: u32 = 500;

impl Resource for User {
    fn repository(state: &AppState) -> Arc<dyn ResourceRepository<Self>> {
        state.users.clone()
    }
}

pub async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(Envelope::one(fetch_one::<User>(&state, &user.id).await?)))
}

/// Name, email and photo only. Password changes have their own route.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: JsonOrMultipart<UpdateMeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (request, photo) = match body {
        JsonOrMultipart::Json(request) => (request, None),
        JsonOrMultipart::Multipart(multipart) => {
            let form = read_multipart(multipart, &[("photo", 1)]).await?;
            let photo = form.files_named("photo").next().map(|f| f.data.clone());
            (form.fields_as::<UpdateMeRequest>()?, photo)
        }
    };

    if request.touches_password() {
        return Err(AppError::Validation(
            "This route is not for password updates. Please use /updateMyPassword.".into(),
        ));
    }

    let mut patch = UserPatch {
        name: request.name,
        email: request.email,
        photo: None,
        role: None,
    };
    patch.clone().apply(&mut user.clone())?;

    if let Some(data) = photo {
        let filename = format!("user-{}-{}.jpeg", user.id, Utc::now().timestamp_millis());
        state
            .image_store
            .save_jpeg(data, PHOTO_SIZE, PHOTO_SIZE, &format!("img/users/{}", filename))
            .await?;
        patch.photo = Some(filename);
    }

    let updated = update_record::<User>(&state, &user.id, patch).await?;

    Ok(Json(json!({ "status": "success", "data": { "user": updated } })))
}

pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    delete_record::<User>(&state, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Accounts are only ever created through sign-up.
pub async fn create_user() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "status": "error",
            "message": "This route is not defined! Please use /signup instead",
        })),
    )
}
