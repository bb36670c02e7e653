use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::dtos::responses::SessionResponse;
use crate::api::extractors::auth::AuthUser;
use crate::api::handlers::factory::{create_record, not_found, Resource};
use crate::domain::models::{
    booking::{Booking, NewBooking},
    payment::{CheckoutRequest, WebhookEvent},
    tour::Tour,
};
use crate::domain::ports::ResourceRepository;
use crate::error::AppError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

impl Resource for Booking {
    fn repository(state: &AppState) -> Arc<dyn ResourceRepository<Self>> {
        state.bookings.clone()
    }
}

pub async fn get_checkout_session(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(tour_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tour = state.tours.find_by_id(&tour_id).await?.ok_or_else(not_found::<Tour>)?;
    let public_url = &state.config.public_url;

    let request = CheckoutRequest {
        tour_id: tour.id.clone(),
        tour_name: tour.name.clone(),
        summary: tour.summary.clone(),
        image_url: format!("{}/img/tours/{}", public_url, tour.image_cover),
        price: tour.price,
        customer_email: user.email.clone(),
        success_url: format!("{}/my-tours?alert=booking", public_url),
        cancel_url: format!("{}/tour/{}", public_url, tour.slug),
    };

    let session = state.payment_gateway.create_checkout_session(&request).await?;
    Ok(Json(SessionResponse { status: "success", session }))
}

/// Payment provider callback. Consumes the raw body, the signature covers
/// its exact bytes.
pub async fn webhook_checkout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("Webhook error: missing signature".into()))?;

    match state.payment_gateway.verify_webhook(&body, signature)? {
        WebhookEvent::CheckoutCompleted { tour_id, customer_email, amount } => {
            let user = state
                .user_repo
                .find_by_email(&customer_email)
                .await?
                .ok_or_else(|| AppError::NotFound("There is no user with that email address.".into()))?;

            let booking = create_record::<Booking>(
                &state,
                NewBooking { tour_id, user_id: user.id, price: amount, paid: true },
            )
            .await?;
            info!("Booking {} created from checkout", booking.booking.id);
        }
        WebhookEvent::Ignored(kind) => warn!("Ignoring webhook event {}", kind),
    }

    Ok(Json(json!({ "received": true })))
}
