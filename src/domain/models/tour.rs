use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::models::{Document, Patch, Validate};
use crate::domain::services::api_features::{FieldKind, FieldSpec};
use crate::error::AppError;

pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "difficult"];
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;
pub const DEFAULT_IMAGE_COVER: &str = "default-cover.jpg";

#[derive(Debug, Serialize, FromRow, Clone)]
pub struct Tour {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Json<Vec<String>>,
    pub start_dates: Json<Vec<DateTime<Utc>>>,
    pub start_lng: Option<f64>,
    pub start_lat: Option<f64>,
    pub start_address: Option<String>,
    pub start_description: Option<String>,
    #[serde(skip_serializing)]
    pub secret_tour: bool,
    pub created_at: DateTime<Utc>,
}

/// Start location as GeoJSON-style `[lng, lat]`.
#[derive(Debug, Deserialize, Clone)]
pub struct StartLocation {
    pub coordinates: [f64; 2],
    pub address: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewTour {
    pub name: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    pub start_location: Option<StartLocation>,
    #[serde(default)]
    pub secret_tour: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct TourPatch {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<String>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub start_location: Option<StartLocation>,
    pub secret_tour: Option<bool>,
}

impl Tour {
    pub fn new(input: &NewTour) -> Self {
        let name = input.name.trim().to_string();
        let location = input.start_location.as_ref();

        Self {
            id: Uuid::new_v4().to_string(),
            slug: slugify(&name),
            name,
            duration: input.duration,
            max_group_size: input.max_group_size,
            difficulty: input.difficulty.clone(),
            ratings_average: DEFAULT_RATINGS_AVERAGE,
            ratings_quantity: 0,
            price: input.price,
            price_discount: input.price_discount,
            summary: input.summary.trim().to_string(),
            description: input.description.as_ref().map(|d| d.trim().to_string()),
            image_cover: input.image_cover.clone().unwrap_or_else(|| DEFAULT_IMAGE_COVER.to_string()),
            images: Json(input.images.clone()),
            start_dates: Json(input.start_dates.clone()),
            start_lng: location.map(|l| l.coordinates[0]),
            start_lat: location.map(|l| l.coordinates[1]),
            start_address: location.and_then(|l| l.address.clone()),
            start_description: location.and_then(|l| l.description.clone()),
            secret_tour: input.secret_tour,
            created_at: Utc::now(),
        }
    }

    /// `(lat, lng)` of the start location, when the tour has one.
    pub fn start_point(&self) -> Option<(f64, f64)> {
        Some((self.start_lat?, self.start_lng?))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let name_len = self.name.chars().count();
        if name_len < 10 {
            return Err(AppError::Validation("A tour name must have more or equal than 10 characters".into()));
        }
        if name_len > 40 {
            return Err(AppError::Validation("A tour name must have less or equal than 40 characters".into()));
        }
        if self.duration <= 0 {
            return Err(AppError::Validation("A tour must have a positive duration".into()));
        }
        if self.max_group_size <= 0 {
            return Err(AppError::Validation("A tour must have a positive group size".into()));
        }
        if !DIFFICULTIES.contains(&self.difficulty.as_str()) {
            return Err(AppError::Validation("Difficulty is either: easy, medium, difficult".into()));
        }
        if self.price.is_nan() || self.price <= 0.0 {
            return Err(AppError::Validation("A tour must have a positive price".into()));
        }
        if let Some(discount) = self.price_discount
            && !(0.0..self.price).contains(&discount)
        {
            return Err(AppError::Validation(format!(
                "Discount price ({}) should be below regular price",
                discount
            )));
        }
        if self.summary.is_empty() {
            return Err(AppError::Validation("A tour must have a summary".into()));
        }
        if let Some((lat, lng)) = self.start_point()
            && (!(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng))
        {
            return Err(AppError::Validation("Start location coordinates are out of range".into()));
        }
        Ok(())
    }
}

impl Validate for NewTour {
    fn validate(&self) -> Result<(), AppError> {
        Tour::new(self).validate()
    }
}

impl Patch<Tour> for TourPatch {
    /// Changes land on a copy and are committed only when the merged tour
    /// is valid.
    fn apply(self, target: &mut Tour) -> Result<(), AppError> {
        let mut tour = target.clone();
        if let Some(name) = self.name {
            tour.name = name.trim().to_string();
            tour.slug = slugify(&tour.name);
        }
        if let Some(duration) = self.duration {
            tour.duration = duration;
        }
        if let Some(size) = self.max_group_size {
            tour.max_group_size = size;
        }
        if let Some(difficulty) = self.difficulty {
            tour.difficulty = difficulty;
        }
        if let Some(price) = self.price {
            tour.price = price;
        }
        if let Some(discount) = self.price_discount {
            tour.price_discount = Some(discount);
        }
        if let Some(summary) = self.summary {
            tour.summary = summary.trim().to_string();
        }
        if let Some(description) = self.description {
            tour.description = Some(description.trim().to_string());
        }
        if let Some(cover) = self.image_cover {
            tour.image_cover = cover;
        }
        if let Some(images) = self.images {
            tour.images = Json(images);
        }
        if let Some(dates) = self.start_dates {
            tour.start_dates = Json(dates);
        }
        if let Some(location) = self.start_location {
            tour.start_lng = Some(location.coordinates[0]);
            tour.start_lat = Some(location.coordinates[1]);
            tour.start_address = location.address;
            tour.start_description = location.description;
        }
        if let Some(secret) = self.secret_tour {
            tour.secret_tour = secret;
        }
        tour.validate()?;
        *target = tour;
        Ok(())
    }
}

impl Document for Tour {
    const NAME: &'static str = "tour";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("id", "id", FieldKind::Text),
        FieldSpec::new("name", "name", FieldKind::Text),
        FieldSpec::new("slug", "slug", FieldKind::Text),
        FieldSpec::new("duration", "duration", FieldKind::Integer).repeatable(),
        FieldSpec::new("max_group_size", "max_group_size", FieldKind::Integer).repeatable(),
        FieldSpec::new("difficulty", "difficulty", FieldKind::Text).repeatable(),
        FieldSpec::new("ratings_average", "ratings_average", FieldKind::Number).repeatable(),
        FieldSpec::new("ratings_quantity", "ratings_quantity", FieldKind::Integer).repeatable(),
        FieldSpec::new("price", "price", FieldKind::Number).repeatable(),
        FieldSpec::new("price_discount", "price_discount", FieldKind::Number),
        FieldSpec::new("created_at", "created_at", FieldKind::Timestamp),
    ];

    type Record = Tour;
    type Create = NewTour;
    type Update = TourPatch;
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Ratings are stored with one decimal, 4.666 becomes 4.7.
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
