use std::net::IpAddr;
use std::sync::Arc;
use crate::domain::models::{booking::Booking, review::Review, tour::Tour, user::User};
use crate::domain::ports::{
    BookingRepository, ImageStore, PaymentGateway, ResourceRepository, ReviewRepository,
    TourRepository, UserRepository,
};
use crate::domain::services::{auth_service::AuthService, notification_service::NotificationService};
use crate::config::Config;
use governor::DefaultKeyedRateLimiter;
use tera::Tera;

/// Every backend exposes a generic CRUD half (`tours`, `users`, ...)
/// and an entity-specific half (`tour_repo`, `user_repo`, ...). Both
/// point at the same repository instance.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tours: Arc<dyn ResourceRepository<Tour>>,
    pub tour_repo: Arc<dyn TourRepository>,
    pub users: Arc<dyn ResourceRepository<User>>,
    pub user_repo: Arc<dyn UserRepository>,
    pub reviews: Arc<dyn ResourceRepository<Review>>,
    pub review_repo: Arc<dyn ReviewRepository>,
    pub bookings: Arc<dyn ResourceRepository<Booking>>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub auth_service: Arc<AuthService>,
    pub notifications: Arc<NotificationService>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub image_store: Arc<dyn ImageStore>,
    pub templates: Arc<Tera>,
    pub rate_limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}
