use crate::domain::{
    models::{review::{NewReview, Review, ReviewPatch, ReviewWithAuthor}, Patch},
    ports::{ResourceRepository, ReviewRepository},
    services::api_features::ListQuery,
};
use crate::error::AppError;
use crate::infra::repositories::{list_query_sql::push_list_query, map_review_conflict};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const SELECT_WITH_AUTHOR: &str = "SELECT r.id, r.review, r.rating, r.tour_id, r.user_id, r.created_at, \
    u.name AS author_name, u.photo AS author_photo \
    FROM reviews r JOIN users u ON u.id = r.user_id";

pub struct SqliteReviewRepo {
    pool: SqlitePool,
}

impl SqliteReviewRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceRepository<Review> for SqliteReviewRepo {
    async fn find_all(&self, query: &ListQuery) -> Result<Vec<ReviewWithAuthor>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("{SELECT_WITH_AUTHOR} WHERE TRUE"));
        push_list_query(&mut builder, query);

        builder.build_query_as::<ReviewWithAuthor>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ReviewWithAuthor>, AppError> {
        sqlx::query_as::<_, ReviewWithAuthor>(&format!("{SELECT_WITH_AUTHOR} WHERE r.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create(&self, input: &NewReview) -> Result<ReviewWithAuthor, AppError> {
        let review = Review::new(input);

        sqlx::query(
            "INSERT INTO reviews (id, review, rating, tour_id, user_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
            .bind(&review.id)
            .bind(&review.review)
            .bind(review.rating)
            .bind(&review.tour_id)
            .bind(&review.user_id)
            .bind(review.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_review_conflict)?;

        self.find_by_id(&review.id).await?
            .ok_or_else(|| AppError::InternalWithMsg(format!("Review {} vanished after insert", review.id)))
    }

    async fn update(&self, id: &str, patch: ReviewPatch) -> Result<Option<ReviewWithAuthor>, AppError> {
        let existing = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;
        let Some(mut review) = existing else {
            return Ok(None);
        };
        patch.apply(&mut review)?;

        sqlx::query("UPDATE reviews SET review = ?, rating = ? WHERE id = ?")
            .bind(&review.review)
            .bind(review.rating)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        self.find_by_id(id).await
    }

    async fn delete(&self, id: &str) -> Result<Option<ReviewWithAuthor>, AppError> {
        let Some(review) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(Some(review))
    }
}

#[async_trait]
impl ReviewRepository for SqliteReviewRepo {
    async fn find_by_tour(&self, tour_id: &str) -> Result<Vec<ReviewWithAuthor>, AppError> {
        sqlx::query_as::<_, ReviewWithAuthor>(&format!(
            "{SELECT_WITH_AUTHOR} WHERE r.tour_id = ? ORDER BY r.created_at DESC"
        ))
            .bind(tour_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn rating_stats(&self, tour_id: &str) -> Result<(i64, Option<f64>), AppError> {
        sqlx::query_as::<_, (i64, Option<f64>)>(
            "SELECT COUNT(*), AVG(rating) FROM reviews WHERE tour_id = ?",
        )
            .bind(tour_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
