use crate::error::AppError;

pub mod list_query_sql;

pub mod sqlite_tour_repo;
pub mod sqlite_user_repo;
pub mod sqlite_review_repo;
pub mod sqlite_booking_repo;

pub mod postgres_tour_repo;
pub mod postgres_user_repo;
pub mod postgres_review_repo;
pub mod postgres_booking_repo;

/// One review per user and tour is enforced by a unique index.
pub fn map_review_conflict(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict("You have already reviewed this tour.".into())
        }
        other => AppError::Database(other),
    }
}
