use crate::domain::models::{
    Document,
    booking::Booking,
    payment::{CheckoutRequest, CheckoutSession, WebhookEvent},
    review::ReviewWithAuthor,
    tour::Tour,
    user::User,
};
use crate::domain::services::api_features::ListQuery;
use crate::domain::services::reporting::DifficultyStats;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage behind the generic CRUD handlers.
#[async_trait]
pub trait ResourceRepository<D: Document>: Send + Sync {
    async fn find_all(&self, query: &ListQuery) -> Result<Vec<D::Record>, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<D::Record>, AppError>;
    async fn create(&self, input: &D::Create) -> Result<D::Record, AppError>;
    /// `None` when no document has this id.
    async fn update(&self, id: &str, patch: D::Update) -> Result<Option<D::Record>, AppError>;
    /// `None` when no document has this id. Returns what was removed.
    async fn delete(&self, id: &str) -> Result<Option<D::Record>, AppError>;
}

#[async_trait]
pub trait TourRepository: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tour>, AppError>;
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Tour>, AppError>;
    /// Every non-secret tour, for reports and pages.
    async fn list_visible(&self) -> Result<Vec<Tour>, AppError>;
    async fn update_ratings(&self, tour_id: &str, average: f64, quantity: i32) -> Result<(), AppError>;
    async fn stats_by_difficulty(&self, min_rating: f64) -> Result<Vec<DifficultyStats>, AppError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>, AppError>;
    /// Persists password hash, change time and reset-token fields.
    async fn save_credentials(&self, user: &User) -> Result<(), AppError>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn find_by_tour(&self, tour_id: &str) -> Result<Vec<ReviewWithAuthor>, AppError>;
    /// `(count, average)` over every review of a tour.
    async fn rating_stats(&self, tour_id: &str) -> Result<(i64, Option<f64>), AppError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Booking>, AppError>;
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, AppError>;
    /// Checks the provider signature over the raw body and decodes the event.
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, AppError>;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Resizes to cover `width`x`height`, encodes as JPEG and writes it to
    /// `relative_path` under the public directory.
    async fn save_jpeg(&self, data: Vec<u8>, width: u32, height: u32, relative_path: &str) -> Result<(), AppError>;
}
