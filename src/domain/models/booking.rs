use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::models::{Document, Patch, Validate};
use crate::domain::services::api_features::{FieldKind, FieldSpec};
use crate::error::AppError;

#[derive(Debug, Serialize, FromRow, Clone)]
pub struct Booking {
    pub id: String,
    pub tour_id: String,
    pub user_id: String,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow, Clone)]
pub struct BookingDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub booking: Booking,
    pub tour_name: String,
    pub user_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewBooking {
    #[serde(alias = "tour")]
    pub tour_id: String,
    #[serde(alias = "user")]
    pub user_id: String,
    pub price: f64,
    #[serde(default = "default_paid")]
    pub paid: bool,
}

fn default_paid() -> bool {
    true
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct BookingPatch {
    pub price: Option<f64>,
    pub paid: Option<bool>,
}

impl Booking {
    pub fn new(input: &NewBooking) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tour_id: input.tour_id.clone(),
            user_id: input.user_id.clone(),
            price: input.price,
            paid: input.paid,
            created_at: Utc::now(),
        }
    }
}

fn validate_price(price: f64) -> Result<(), AppError> {
    if price.is_nan() || price < 0.0 {
        return Err(AppError::Validation("Booking must have a price.".into()));
    }
    Ok(())
}

impl Validate for NewBooking {
    fn validate(&self) -> Result<(), AppError> {
        if self.tour_id.is_empty() {
            return Err(AppError::Validation("Booking must belong to a tour!".into()));
        }
        if self.user_id.is_empty() {
            return Err(AppError::Validation("Booking must belong to a user!".into()));
        }
        validate_price(self.price)
    }
}

impl Patch<Booking> for BookingPatch {
    fn apply(self, target: &mut Booking) -> Result<(), AppError> {
        if let Some(price) = self.price {
            target.price = price;
        }
        if let Some(paid) = self.paid {
            target.paid = paid;
        }
        validate_price(target.price)
    }
}

impl Document for Booking {
    const NAME: &'static str = "booking";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("id", "b.id", FieldKind::Text),
        FieldSpec::new("tour_id", "b.tour_id", FieldKind::Text),
        FieldSpec::new("user_id", "b.user_id", FieldKind::Text),
        FieldSpec::new("price", "b.price", FieldKind::Number),
        FieldSpec::new("paid", "b.paid", FieldKind::Boolean),
        FieldSpec::new("created_at", "b.created_at", FieldKind::Timestamp),
    ];

    type Record = BookingDetails;
    type Create = NewBooking;
    type Update = BookingPatch;
}
