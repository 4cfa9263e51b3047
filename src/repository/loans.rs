//! Loans repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use super::is_unique_violation;
use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, NewLoan},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoansRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Loan>;
    /// All loans, newest first
    async fn list_all(&self) -> AppResult<Vec<Loan>>;
    /// Loans of one user, newest first
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Loan>>;
    /// The user's active or overdue loan of a book, if any
    async fn find_outstanding(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Loan>>;
    /// Take one available copy and record the loan in a single step.
    ///
    /// Fails with `NotAvailable` when no copy is left and with
    /// `DuplicateActive` when the user already holds an outstanding loan of
    /// the book.
    async fn open(&self, loan: &NewLoan) -> AppResult<Loan>;
    /// Mark an outstanding loan returned and give its copy back
    async fn close(&self, id: Uuid, returned_at: DateTime<Utc>) -> AppResult<Loan>;
    /// Delete a loan record, restoring the copy if it was still outstanding
    async fn remove(&self, id: Uuid) -> AppResult<Loan>;
    /// Flag every active loan due before `now` as overdue
    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct PgLoansRepository {
    pool: Pool<Postgres>,
}

impl PgLoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const OUTSTANDING: &str = "status IN ('active', 'overdue')";

/// Give a copy back to its book. A counter already at `copies` has drifted
/// and is left for the counter repair.
async fn release_copy(tx: &mut Transaction<'_, Postgres>, book_id: Uuid) -> AppResult<()> {
    let released = sqlx::query(
        "UPDATE books SET available_copies = available_copies + 1 WHERE id = $1 AND available_copies < copies",
    )
    .bind(book_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if released == 0 {
        tracing::warn!(book_id = %book_id, "Copy release skipped, available copies already at the owned total");
    }
    Ok(())
}

#[async_trait]
impl LoansRepository for PgLoansRepository {
    async fn get(&self, id: Uuid) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))
    }

    async fn list_all(&self) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans ORDER BY reservation_date DESC, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE user_id = $1 ORDER BY reservation_date DESC, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn find_outstanding(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT * FROM loans WHERE user_id = $1 AND book_id = $2 AND {}",
            OUTSTANDING
        ))
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(loan)
    }

    async fn open(&self, loan: &NewLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        // Takes the book row lock, so concurrent loans of one book queue here
        let taken = sqlx::query(
            "UPDATE books SET available_copies = available_copies - 1 WHERE id = $1 AND available_copies > 0",
        )
        .bind(loan.book_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if taken == 0 {
            let title: Option<String> = sqlx::query_scalar("SELECT title FROM books WHERE id = $1")
                .bind(loan.book_id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match title {
                Some(title) => AppError::NotAvailable(format!("No copies of '{}' are available", title)),
                None => AppError::NotFound(format!("Book {} not found", loan.book_id)),
            });
        }

        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (id, user_id, book_id, reservation_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5, 'active')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(loan.user_id)
        .bind(loan.book_id)
        .bind(loan.reservation_date)
        .bind(loan.due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateActive("You already have this book on loan".to_string())
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;
        Ok(created)
    }

    async fn close(&self, id: Uuid, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query_as::<_, Loan>(&format!(
            "UPDATE loans SET status = 'returned', return_date = $2 WHERE id = $1 AND {} RETURNING *",
            OUTSTANDING
        ))
        .bind(id)
        .bind(returned_at)
        .fetch_optional(&mut *tx)
        .await?;

        let loan = match closed {
            Some(loan) => loan,
            None => {
                let current = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
                return Err(match current {
                    Some(loan) => AppError::NotActive(format!("Loan {} is already {:?}", id, loan.status)),
                    None => AppError::NotFound(format!("Loan {} not found", id)),
                });
            }
        };

        release_copy(&mut tx, loan.book_id).await?;

        tx.commit().await?;
        Ok(loan)
    }

    async fn remove(&self, id: Uuid) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>("DELETE FROM loans WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))?;

        if loan.status.is_outstanding() {
            release_copy(&mut tx, loan.book_id).await?;
        }

        tx.commit().await?;
        Ok(loan)
    }

    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("UPDATE loans SET status = 'overdue' WHERE status = 'active' AND due_date < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
