use crate::domain::{
    models::{user::{User, UserPatch}, Patch},
    ports::{ResourceRepository, UserRepository},
    services::api_features::ListQuery,
};
use crate::error::AppError;
use crate::infra::repositories::list_query_sql::push_list_query;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::error;

pub struct SqliteUserRepo {
    pool: SqlitePool,
}

impl SqliteUserRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceRepository<User> for SqliteUserRepo {
    async fn find_all(&self, query: &ListQuery) -> Result<Vec<User>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE active = TRUE");
        push_list_query(&mut builder, query);

        builder.build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? AND active = TRUE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create(&self, user: &User) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (
                id, name, email, photo, role, password_hash, password_changed_at,
                password_reset_token, password_reset_expires, active, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *"#,
        )
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.photo)
            .bind(&user.role)
            .bind(&user.password_hash)
            .bind(user.password_changed_at)
            .bind(&user.password_reset_token)
            .bind(user.password_reset_expires)
            .bind(user.active)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn update(&self, id: &str, patch: UserPatch) -> Result<Option<User>, AppError> {
        let Some(mut user) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut user)?;

        sqlx::query_as::<_, User>(
            "UPDATE users SET name = ?, email = ?, photo = ?, role = ? WHERE id = ? RETURNING *",
        )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.photo)
            .bind(&user.role)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    /// Users are deactivated, never removed.
    async fn delete(&self, id: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET active = FALSE WHERE id = ? AND active = TRUE RETURNING *",
        )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("SQLite user deactivation failed: {:?}", e);
                AppError::Database(e)
            })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? AND active = TRUE")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE password_reset_token = ? AND password_reset_expires > ? AND active = TRUE",
        )
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn save_credentials(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE users SET
                password_hash = ?, password_changed_at = ?,
                password_reset_token = ?, password_reset_expires = ?
               WHERE id = ?"#,
        )
            .bind(&user.password_hash)
            .bind(user.password_changed_at)
            .bind(&user.password_reset_token)
            .bind(user.password_reset_expires)
            .bind(&user.id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }
}
