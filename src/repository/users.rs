//! Users repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::is_unique_violation;
use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, Role, UpdateGuestProfile, User},
};

#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<User>;
    /// Case-insensitive email lookup
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Fails with `Conflict` when the email is taken
    async fn create(&self, user: NewUser) -> AppResult<User>;
    async fn list_by_role(&self, role: Role) -> AppResult<Vec<User>>;
    async fn update_guest_profile(&self, id: Uuid, profile: &UpdateGuestProfile) -> AppResult<User>;
}

#[derive(Clone)]
pub struct PgUsersRepository {
    pool: Pool<Postgres>,
}

impl PgUsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsersRepository for PgUsersRepository {
    async fn get(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, expertise, bio, organization)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(&user.expertise)
        .bind(&user.bio)
        .bind(&user.organization)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("User with email {} already exists", user.email))
            } else {
                e.into()
            }
        })
    }

    async fn list_by_role(&self, role: Role) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE role = $1 ORDER BY username")
            .bind(role)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_guest_profile(&self, id: Uuid, profile: &UpdateGuestProfile) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                expertise = COALESCE($2, expertise),
                bio = COALESCE($3, bio),
                organization = COALESCE($4, organization),
                is_available = COALESCE($5, is_available)
            WHERE id = $1 AND role = 'guest'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&profile.expertise)
        .bind(&profile.bio)
        .bind(&profile.organization)
        .bind(profile.is_available)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::InvalidGuestRole(format!("User {} is not a guest", id)))
    }
}
