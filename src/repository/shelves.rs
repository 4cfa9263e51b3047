//! Shelves repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::is_unique_violation;
use crate::{
    error::{AppError, AppResult},
    models::shelf::{CreateShelf, Shelf, UpdateShelf, DEFAULT_SHELF_CAPACITY},
};

#[async_trait]
pub trait ShelvesRepository: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Shelf>>;
    async fn get(&self, id: Uuid) -> AppResult<Shelf>;
    async fn find_by_number(&self, shelf_number: &str) -> AppResult<Option<Shelf>>;
    async fn create(&self, data: &CreateShelf) -> AppResult<Shelf>;
    /// Rejects a capacity below the number of books already on the shelf
    async fn update(&self, id: Uuid, data: &UpdateShelf) -> AppResult<Shelf>;
    /// Fails with `NotEmpty` while any book references the shelf
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    /// Recompute `current_books` from the books on the shelf in one step,
    /// returning the value written
    async fn recount_books(&self, id: Uuid) -> AppResult<i32>;
}

#[derive(Clone)]
pub struct PgShelvesRepository {
    pool: Pool<Postgres>,
}

impl PgShelvesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShelvesRepository for PgShelvesRepository {
    async fn list(&self) -> AppResult<Vec<Shelf>> {
        let shelves = sqlx::query_as::<_, Shelf>("SELECT * FROM shelves ORDER BY shelf_number")
            .fetch_all(&self.pool)
            .await?;
        Ok(shelves)
    }

    async fn get(&self, id: Uuid) -> AppResult<Shelf> {
        sqlx::query_as::<_, Shelf>("SELECT * FROM shelves WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Shelf {} not found", id)))
    }

    async fn find_by_number(&self, shelf_number: &str) -> AppResult<Option<Shelf>> {
        let shelf = sqlx::query_as::<_, Shelf>("SELECT * FROM shelves WHERE shelf_number = $1")
            .bind(shelf_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(shelf)
    }

    async fn create(&self, data: &CreateShelf) -> AppResult<Shelf> {
        sqlx::query_as::<_, Shelf>(
            r#"
            INSERT INTO shelves (id, shelf_number, location, section, capacity, current_books, description)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.shelf_number)
        .bind(&data.location)
        .bind(&data.section)
        .bind(data.capacity.unwrap_or(DEFAULT_SHELF_CAPACITY))
        .bind(&data.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Shelf {} already exists", data.shelf_number))
            } else {
                e.into()
            }
        })
    }

    async fn update(&self, id: Uuid, data: &UpdateShelf) -> AppResult<Shelf> {
        let updated = sqlx::query_as::<_, Shelf>(
            r#"
            UPDATE shelves SET
                shelf_number = COALESCE($2, shelf_number),
                location = COALESCE($3, location),
                section = COALESCE($4, section),
                capacity = COALESCE($5, capacity),
                description = COALESCE($6, description)
            WHERE id = $1 AND COALESCE($5, capacity) >= current_books
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.shelf_number)
        .bind(&data.location)
        .bind(&data.section)
        .bind(data.capacity)
        .bind(&data.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Shelf number already in use".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        match updated {
            Some(shelf) => Ok(shelf),
            None => {
                let shelf = self.get(id).await?;
                Err(AppError::CapacityExceeded(format!(
                    "Shelf {} holds {} books, capacity cannot be lower",
                    shelf.shelf_number, shelf.current_books
                )))
            }
        }
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Lock the shelf so no book can be placed on it while we check
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM shelves WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Shelf {} not found", id)));
        }

        let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE shelf_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if books > 0 {
            return Err(AppError::NotEmpty(format!(
                "Cannot delete shelf. There are {} book(s) on this shelf",
                books
            )));
        }

        sqlx::query("DELETE FROM shelves WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn recount_books(&self, id: Uuid) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        // Book placement writes update this row in the same transaction
        sqlx::query("SELECT id FROM shelves WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Shelf {} not found", id)))?;

        let current: i32 = sqlx::query_scalar(
            r#"
            UPDATE shelves SET current_books = (
                SELECT COUNT(*) FROM books WHERE shelf_id = $1
            )::INTEGER
            WHERE id = $1
            RETURNING current_books
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(current)
    }
}
