//! Books repository
//!
//! Every write that changes which shelf a book sits on also moves the shelf
//! counters, inside one transaction.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use super::is_unique_violation;
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook, UpdateBook},
};

#[async_trait]
pub trait BooksRepository: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Book>>;
    async fn get(&self, id: Uuid) -> AppResult<Book>;
    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>>;
    async fn list_on_shelf(&self, shelf_id: Uuid) -> AppResult<Vec<Book>>;
    /// Insert the book and take a place on its shelf, all or nothing
    async fn create_on_shelf(&self, data: &CreateBook) -> AppResult<Book>;
    async fn update(&self, id: Uuid, data: &UpdateBook) -> AppResult<Book>;
    /// Change the owned copies; available copies shift by the same delta
    async fn set_copies(&self, id: Uuid, copies: i32) -> AppResult<Book>;
    /// Paired shelf re-assignment
    async fn move_to_shelf(&self, id: Uuid, shelf_id: Uuid) -> AppResult<Book>;
    /// Remove a book with no outstanding loans and release its shelf place
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    /// Recompute `available_copies` from the outstanding loans of the book
    /// in one step, returning the value written
    async fn recount_available_copies(&self, id: Uuid) -> AppResult<i32>;
}

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Take one place on a shelf, failing when it is missing or full
async fn claim_shelf_place(tx: &mut Transaction<'_, Postgres>, shelf_id: Uuid) -> AppResult<()> {
    let claimed = sqlx::query(
        "UPDATE shelves SET current_books = current_books + 1 WHERE id = $1 AND current_books < capacity",
    )
    .bind(shelf_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if claimed == 1 {
        return Ok(());
    }

    let shelf_number: Option<String> = sqlx::query_scalar("SELECT shelf_number FROM shelves WHERE id = $1")
        .bind(shelf_id)
        .fetch_optional(&mut **tx)
        .await?;
    match shelf_number {
        Some(number) => Err(AppError::CapacityExceeded(format!("Shelf {} is full", number))),
        None => Err(AppError::NotFound(format!("Shelf {} not found", shelf_id))),
    }
}

async fn release_shelf_place(tx: &mut Transaction<'_, Postgres>, shelf_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE shelves SET current_books = current_books - 1 WHERE id = $1 AND current_books > 0")
        .bind(shelf_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn lock_book(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> AppResult<Book> {
    sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
}

fn isbn_conflict(e: sqlx::Error, isbn: &str) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict(format!("Book with ISBN {} already exists", isbn))
    } else {
        e.into()
    }
}

#[async_trait]
impl BooksRepository for PgBooksRepository {
    async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY title, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn get(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn list_on_shelf(&self, shelf_id: Uuid) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE shelf_id = $1 ORDER BY title, id")
            .bind(shelf_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn create_on_shelf(&self, data: &CreateBook) -> AppResult<Book> {
        let copies = data.copies.unwrap_or(1);
        let mut tx = self.pool.begin().await?;

        claim_shelf_place(&mut tx, data.shelf_id).await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (id, title, author, isbn, published_year, genre, copies, available_copies, shelf_id, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.title)
        .bind(&data.author)
        .bind(&data.isbn)
        .bind(data.published_year)
        .bind(&data.genre)
        .bind(copies)
        .bind(data.shelf_id)
        .bind(&data.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| isbn_conflict(e, &data.isbn))?;

        tx.commit().await?;
        Ok(book)
    }

    async fn update(&self, id: Uuid, data: &UpdateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                published_year = COALESCE($5, published_year),
                genre = COALESCE($6, genre),
                description = COALESCE($7, description)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.author)
        .bind(&data.isbn)
        .bind(data.published_year)
        .bind(&data.genre)
        .bind(&data.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| isbn_conflict(e, data.isbn.as_deref().unwrap_or_default()))?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    async fn set_copies(&self, id: Uuid, copies: i32) -> AppResult<Book> {
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                available_copies = available_copies + ($2 - copies),
                copies = $2
            WHERE id = $1 AND available_copies + ($2 - copies) >= 0
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(copies)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(book) => Ok(book),
            None => {
                let book = self.get(id).await?;
                Err(AppError::CapacityExceeded(format!(
                    "{} copies of '{}' are on loan, cannot reduce to {}",
                    book.copies_on_loan(),
                    book.title,
                    copies
                )))
            }
        }
    }

    async fn move_to_shelf(&self, id: Uuid, shelf_id: Uuid) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let book = lock_book(&mut tx, id).await?;
        if book.shelf_id == shelf_id {
            return Ok(book);
        }

        claim_shelf_place(&mut tx, shelf_id).await?;
        release_shelf_place(&mut tx, book.shelf_id).await?;

        let moved = sqlx::query_as::<_, Book>("UPDATE books SET shelf_id = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(shelf_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(moved)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let book = lock_book(&mut tx, id).await?;

        let outstanding: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND status IN ('active', 'overdue')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if outstanding > 0 {
            return Err(AppError::InvalidStateTransition(format!(
                "Book '{}' has {} outstanding loan(s)",
                book.title, outstanding
            )));
        }

        sqlx::query("DELETE FROM loans WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        release_shelf_place(&mut tx, book.shelf_id).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn recount_available_copies(&self, id: Uuid) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        // Loan writes update this row in the same transaction, so once the
        // lock is held the count below cannot miss a committed change
        sqlx::query("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;

        let available: i32 = sqlx::query_scalar(
            r#"
            UPDATE books SET available_copies = GREATEST(0, copies - (
                SELECT COUNT(*) FROM loans
                WHERE book_id = $1 AND status IN ('active', 'overdue')
            )::INTEGER)
            WHERE id = $1
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(available)
    }
}
