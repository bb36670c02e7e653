use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use governor::{Quota, RateLimiter};
use thiserror::Error;
use tracing::info;
use tracing::log::LevelFilter;
use tera::Tera;

use crate::config::Config;
use crate::state::AppState;
use crate::domain::models::{booking::Booking, review::Review, tour::Tour, user::User};
use crate::domain::ports::{
    BookingRepository, EmailService, ImageStore, PaymentGateway, ResourceRepository,
    ReviewRepository, TourRepository, UserRepository,
};
use crate::domain::services::{auth_service::AuthService, notification_service::NotificationService};
use crate::infra::email::http_email_service::HttpEmailService;
use crate::infra::images::fs_image_store::FsImageStore;
use crate::infra::payments::stripe_gateway::StripeGateway;
use crate::infra::repositories::{
    postgres_booking_repo::PostgresBookingRepo, postgres_review_repo::PostgresReviewRepo,
    postgres_tour_repo::PostgresTourRepo, postgres_user_repo::PostgresUserRepo,
    sqlite_booking_repo::SqliteBookingRepo, sqlite_review_repo::SqliteReviewRepo,
    sqlite_tour_repo::SqliteTourRepo, sqlite_user_repo::SqliteUserRepo,
};

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("template failed to load: {0}")]
    Templates(#[from] tera::Error),
}

/// Both halves of every repository, already coerced to their ports.
pub struct Repositories {
    pub tours: Arc<dyn ResourceRepository<Tour>>,
    pub tour_repo: Arc<dyn TourRepository>,
    pub users: Arc<dyn ResourceRepository<User>>,
    pub user_repo: Arc<dyn UserRepository>,
    pub reviews: Arc<dyn ResourceRepository<Review>>,
    pub review_repo: Arc<dyn ReviewRepository>,
    pub bookings: Arc<dyn ResourceRepository<Booking>>,
    pub booking_repo: Arc<dyn BookingRepository>,
}

impl Repositories {
    pub fn sqlite(pool: SqlitePool) -> Self {
        let tours = Arc::new(SqliteTourRepo::new(pool.clone()));
        let users = Arc::new(SqliteUserRepo::new(pool.clone()));
        let reviews = Arc::new(SqliteReviewRepo::new(pool.clone()));
        let bookings = Arc::new(SqliteBookingRepo::new(pool));

        Self {
            tours: tours.clone(),
            tour_repo: tours,
            users: users.clone(),
            user_repo: users,
            reviews: reviews.clone(),
            review_repo: reviews,
            bookings: bookings.clone(),
            booking_repo: bookings,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let tours = Arc::new(PostgresTourRepo::new(pool.clone()));
        let users = Arc::new(PostgresUserRepo::new(pool.clone()));
        let reviews = Arc::new(PostgresReviewRepo::new(pool.clone()));
        let bookings = Arc::new(PostgresBookingRepo::new(pool));

        Self {
            tours: tours.clone(),
            tour_repo: tours,
            users: users.clone(),
            user_repo: users,
            reviews: reviews.clone(),
            review_repo: reviews,
            bookings: bookings.clone(),
            booking_repo: bookings,
        }
    }
}

/// External adapters, swapped for mocks in tests.
pub struct Adapters {
    pub email: Arc<dyn EmailService>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub image_store: Arc<dyn ImageStore>,
}

pub async fn bootstrap_state(config: &Config) -> Result<AppState, BootstrapError> {
    let database_url = &config.database_url;

    let repositories = if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Initializing PostgreSQL connection...");

        let mut opts: PgConnectOptions = database_url.parse()?;
        opts = opts.log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(opts)
            .await?;

        run_postgres_migrations(&pool).await?;
        Repositories::postgres(pool)
    } else {
        info!("Initializing SQLite connection with WAL Mode...");

        let opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        run_sqlite_migrations(&pool).await?;
        Repositories::sqlite(pool)
    };

    let adapters = Adapters {
        email: Arc::new(HttpEmailService::new(
            config.mail_service_url.clone(),
            config.mail_service_token.clone(),
            config.mail_from.clone(),
        )),
        payment_gateway: Arc::new(StripeGateway::new(
            config.stripe_api_url.clone(),
            config.stripe_secret_key.clone(),
            config.stripe_webhook_secret.clone(),
        )),
        image_store: Arc::new(FsImageStore::new(&config.public_dir)),
    };

    Ok(assemble_state(config, repositories, adapters, load_templates()?))
}

pub fn assemble_state(config: &Config, repos: Repositories, adapters: Adapters, templates: Tera) -> AppState {
    let templates = Arc::new(templates);
    let auth_service = Arc::new(AuthService::new(repos.users.clone(), repos.user_repo.clone(), config.clone()));
    let notifications = Arc::new(NotificationService::new(adapters.email, templates.clone()));

    let per_hour = NonZeroU32::new(config.rate_limit_per_hour).unwrap_or(NonZeroU32::MIN);
    let rate_limiter = Arc::new(RateLimiter::keyed(Quota::per_hour(per_hour)));

    AppState {
        config: config.clone(),
        tours: repos.tours,
        tour_repo: repos.tour_repo,
        users: repos.users,
        user_repo: repos.user_repo,
        reviews: repos.reviews,
        review_repo: repos.review_repo,
        bookings: repos.bookings,
        booking_repo: repos.booking_repo,
        auth_service,
        notifications,
        payment_gateway: adapters.payment_gateway,
        image_store: adapters.image_store,
        templates,
        rate_limiter,
    }
}

/// Pages and mails are compiled into the binary.
pub fn load_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("views/base.html", include_str!("../templates/views/base.html")),
        ("views/overview.html", include_str!("../templates/views/overview.html")),
        ("views/tour.html", include_str!("../templates/views/tour.html")),
        ("views/login.html", include_str!("../templates/views/login.html")),
        ("views/account.html", include_str!("../templates/views/account.html")),
        ("views/error.html", include_str!("../templates/views/error.html")),
        ("email/base.html", include_str!("../templates/email/base.html")),
        ("email/welcome.html", include_str!("../templates/email/welcome.html")),
        ("email/password_reset.html", include_str!("../templates/email/password_reset.html")),
    ])?;
    Ok(tera)
}

pub async fn run_postgres_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations/postgres").run(pool).await
}

pub async fn run_sqlite_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations/sqlite").run(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_compile() {
        let tera = load_templates().unwrap();
        let names: Vec<_> = tera.get_template_names().collect();
        assert!(names.contains(&"views/overview.html"));
        assert!(names.contains(&"email/password_reset.html"));
    }
}
