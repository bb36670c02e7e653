use crate::domain::{
    models::{tour::{NewTour, Tour, TourPatch}, Patch},
    ports::{ResourceRepository, TourRepository},
    services::{api_features::ListQuery, reporting::DifficultyStats},
};
use crate::error::AppError;
use crate::infra::repositories::list_query_sql::push_list_query;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Postgres, PgPool};

pub struct PostgresTourRepo {
    pool: PgPool,
}

impl PostgresTourRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceRepository<Tour> for PostgresTourRepo {
    async fn find_all(&self, query: &ListQuery) -> Result<Vec<Tour>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM tours WHERE secret_tour = FALSE");
        push_list_query(&mut builder, query);

        builder.build_query_as::<Tour>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Tour>, AppError> {
        sqlx::query_as::<_, Tour>("SELECT * FROM tours WHERE id = $1 AND secret_tour = FALSE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create(&self, input: &NewTour) -> Result<Tour, AppError> {
        let tour = Tour::new(input);

        sqlx::query_as::<_, Tour>(
            r#"INSERT INTO tours (
                id, name, slug, duration, max_group_size, difficulty,
                ratings_average, ratings_quantity, price, price_discount,
                summary, description, image_cover, images, start_dates,
                start_lng, start_lat, start_address, start_description,
                secret_tour, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            RETURNING *"#
        )
            .bind(&tour.id)
            .bind(&tour.name)
            .bind(&tour.slug)
            .bind(tour.duration)
            .bind(tour.max_group_size)
            .bind(&tour.difficulty)
            .bind(tour.ratings_average)
            .bind(tour.ratings_quantity)
            .bind(tour.price)
            .bind(tour.price_discount)
            .bind(&tour.summary)
            .bind(&tour.description)
            .bind(&tour.image_cover)
            .bind(&tour.images)
            .bind(&tour.start_dates)
            .bind(tour.start_lng)
            .bind(tour.start_lat)
            .bind(&tour.start_address)
            .bind(&tour.start_description)
            .bind(tour.secret_tour)
            .bind(tour.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn update(&self, id: &str, patch: TourPatch) -> Result<Option<Tour>, AppError> {
        let Some(mut tour) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut tour)?;

        sqlx::query_as::<_, Tour>(
            r#"UPDATE tours SET
                name=$1, slug=$2, duration=$3, max_group_size=$4, difficulty=$5,
                price=$6, price_discount=$7, summary=$8, description=$9,
                image_cover=$10, images=$11, start_dates=$12,
                start_lng=$13, start_lat=$14, start_address=$15, start_description=$16,
                secret_tour=$17
               WHERE id=$18 RETURNING *"#
        )
            .bind(&tour.name)
            .bind(&tour.slug)
            .bind(tour.duration)
            .bind(tour.max_group_size)
            .bind(&tour.difficulty)
            .bind(tour.price)
            .bind(tour.price_discount)
            .bind(&tour.summary)
            .bind(&tour.description)
            .bind(&tour.image_cover)
            .bind(&tour.images)
            .bind(&tour.start_dates)
            .bind(tour.start_lng)
            .bind(tour.start_lat)
            .bind(&tour.start_address)
            .bind(&tour.start_description)
            .bind(tour.secret_tour)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn delete(&self, id: &str) -> Result<Option<Tour>, AppError> {
        sqlx::query_as::<_, Tour>("DELETE FROM tours WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}

#[async_trait]
impl TourRepository for PostgresTourRepo {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tour>, AppError> {
        sqlx::query_as::<_, Tour>("SELECT * FROM tours WHERE slug = $1 AND secret_tour = FALSE")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Tour>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM tours WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(") ORDER BY created_at ASC");

        builder.build_query_as::<Tour>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_visible(&self) -> Result<Vec<Tour>, AppError> {
        sqlx::query_as::<_, Tour>("SELECT * FROM tours WHERE secret_tour = FALSE ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn update_ratings(&self, tour_id: &str, average: f64, quantity: i32) -> Result<(), AppError> {
        sqlx::query("UPDATE tours SET ratings_average = $1, ratings_quantity = $2 WHERE id = $3")
            .bind(average)
            .bind(quantity)
            .bind(tour_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn stats_by_difficulty(&self, min_rating: f64) -> Result<Vec<DifficultyStats>, AppError> {
        sqlx::query_as::<_, DifficultyStats>(
            r#"SELECT
                UPPER(difficulty) AS difficulty,
                COUNT(*) AS num_tours,
                SUM(ratings_quantity) AS num_ratings,
                AVG(ratings_average) AS avg_rating,
                AVG(price) AS avg_price,
                MIN(price) AS min_price,
                MAX(price) AS max_price
               FROM tours
               WHERE ratings_average >= $1 AND secret_tour = FALSE
               GROUP BY UPPER(difficulty)
               ORDER BY avg_price ASC"#
        )
            .bind(min_rating)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
