use crate::domain::{
    models::{booking::{Booking, BookingDetails, BookingPatch, NewBooking}, Patch},
    ports::{BookingRepository, ResourceRepository},
    services::api_features::ListQuery,
};
use crate::error::AppError;
use crate::infra::repositories::list_query_sql::push_list_query;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

const SELECT_DETAILS: &str = "SELECT b.id, b.tour_id, b.user_id, b.price, b.paid, b.created_at, \
    t.name AS tour_name, u.name AS user_name \
    FROM bookings b JOIN tours t ON t.id = b.tour_id JOIN users u ON u.id = b.user_id";

pub struct SqliteBookingRepo {
    pool: SqlitePool,
}

impl SqliteBookingRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceRepository<Booking> for SqliteBookingRepo {
    async fn find_all(&self, query: &ListQuery) -> Result<Vec<BookingDetails>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("{SELECT_DETAILS} WHERE TRUE"));
        push_list_query(&mut builder, query);

        builder.build_query_as::<BookingDetails>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<BookingDetails>, AppError> {
        sqlx::query_as::<_, BookingDetails>(&format!("{SELECT_DETAILS} WHERE b.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create(&self, input: &NewBooking) -> Result<BookingDetails, AppError> {
        let booking = Booking::new(input);

        sqlx::query(
            "INSERT INTO bookings (id, tour_id, user_id, price, paid, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
            .bind(&booking.id)
            .bind(&booking.tour_id)
            .bind(&booking.user_id)
            .bind(booking.price)
            .bind(booking.paid)
            .bind(booking.created_at)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        info!("Booking {} created for tour {}", booking.id, booking.tour_id);

        self.find_by_id(&booking.id).await?
            .ok_or_else(|| AppError::InternalWithMsg(format!("Booking {} vanished after insert", booking.id)))
    }

    async fn update(&self, id: &str, patch: BookingPatch) -> Result<Option<BookingDetails>, AppError> {
        let Some(details) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let mut booking = details.booking;
        patch.apply(&mut booking)?;

        sqlx::query("UPDATE bookings SET price = ?, paid = ? WHERE id = ?")
            .bind(booking.price)
            .bind(booking.paid)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        self.find_by_id(id).await
    }

    async fn delete(&self, id: &str) -> Result<Option<BookingDetails>, AppError> {
        let Some(details) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(Some(details))
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepo {
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE user_id = ? ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
