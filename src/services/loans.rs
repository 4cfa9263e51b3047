//! Loan management service

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{lost_race, optional};
use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        loan::{CreateLoan, Loan, LoanDetails, LoanOp, NewLoan},
        maintenance::SweepResult,
        user::Actor,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    config: LoansConfig,
}

impl LoansService {
    pub fn new(repository: Repository, config: LoansConfig) -> Self {
        Self { repository, config }
    }

    /// All loans, newest first
    pub async fn list_all(&self) -> AppResult<Vec<LoanDetails>> {
        let loans = self.repository.loans.list_all().await?;
        self.with_books(loans).await
    }

    /// Loans of one user, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<LoanDetails>> {
        let loans = self.repository.loans.list_for_user(user_id).await?;
        self.with_books(loans).await
    }

    async fn with_books(&self, loans: Vec<Loan>) -> AppResult<Vec<LoanDetails>> {
        let mut details = Vec::with_capacity(loans.len());
        for loan in loans {
            let book = optional(self.repository.books.get(loan.book_id).await)?;
            details.push(LoanDetails { loan, book });
        }
        Ok(details)
    }

    /// Borrow a book for the acting user
    pub async fn create_loan(&self, actor: Actor, request: CreateLoan) -> AppResult<Loan> {
        let days = request.days_to_return.unwrap_or(self.config.default_loan_days);
        if !(1..=self.config.max_loan_days).contains(&days) {
            return Err(AppError::Validation(format!(
                "daysToReturn must be between 1 and {}",
                self.config.max_loan_days
            )));
        }

        let book = self.repository.books.get(request.book_id).await?;
        if book.available_copies <= 0 {
            return Err(AppError::NotAvailable(format!(
                "No copies of '{}' are available",
                book.title
            )));
        }
        if self
            .repository
            .loans
            .find_outstanding(actor.user_id, book.id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateActive("You already have this book on loan".to_string()));
        }

        let now = Utc::now();
        let loan = self
            .repository
            .loans
            .open(&NewLoan {
                user_id: actor.user_id,
                book_id: book.id,
                reservation_date: now,
                due_date: now + Duration::days(days),
            })
            .await
            .map_err(lost_race("create_loan"))?;

        tracing::info!(loan_id = %loan.id, user_id = %loan.user_id, book_id = %loan.book_id, due = %loan.due_date, "Created loan");
        Ok(loan)
    }

    /// Return a loan. Only the borrower or an administrator may do so.
    pub async fn return_loan(&self, actor: Actor, loan_id: Uuid) -> AppResult<Loan> {
        let loan = self.repository.loans.get(loan_id).await?;
        if !actor.may_act_for(loan.user_id) {
            return Err(AppError::NotAuthorized("You can only return your own loans".to_string()));
        }
        loan.status
            .apply(LoanOp::Return)
            .map_err(|_| AppError::NotActive(format!("Loan {} is already {:?}", loan.id, loan.status)))?;

        let returned = self
            .repository
            .loans
            .close(loan_id, Utc::now())
            .await
            .map_err(lost_race("return_loan"))?;
        tracing::info!(loan_id = %loan_id, book_id = %returned.book_id, "Returned loan");
        Ok(returned)
    }

    /// Administrative removal of a loan record
    pub async fn delete_loan(&self, loan_id: Uuid) -> AppResult<Loan> {
        let removed = self.repository.loans.remove(loan_id).await?;
        tracing::info!(
            loan_id = %loan_id,
            released_copy = removed.status.is_outstanding(),
            "Deleted loan"
        );
        Ok(removed)
    }

    /// Flag every active loan due before `now` as overdue
    pub async fn sweep_overdue(&self, now: DateTime<Utc>) -> AppResult<SweepResult> {
        let updated_count = self.repository.loans.mark_overdue(now).await?;
        if updated_count > 0 {
            tracing::info!(updated_count, "Marked loans overdue");
        }
        Ok(SweepResult { updated_count })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        models::{
            book::CreateBook,
            loan::LoanStatus,
            shelf::CreateShelf,
            user::Role,
        },
        repository::{loans::MockLoansRepository, LoansRepository},
    };

    fn student() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            role: Role::Student,
        }
    }

    async fn book_with_copies(repository: &Repository, copies: i32) -> Uuid {
        let shelf = repository
            .shelves
            .create(&CreateShelf {
                shelf_number: "L1".into(),
                location: "Ground floor".into(),
                section: "Loans".into(),
                capacity: None,
                description: None,
            })
            .await
            .unwrap();
        repository
            .books
            .create_on_shelf(&CreateBook {
                title: "Refactoring".into(),
                author: "Martin Fowler".into(),
                isbn: "978-0201485677".into(),
                published_year: 1999,
                genre: "Software".into(),
                copies: Some(copies),
                shelf_id: shelf.id,
                description: None,
            })
            .await
            .unwrap()
            .id
    }

    fn request(book_id: Uuid) -> CreateLoan {
        CreateLoan {
            book_id,
            days_to_return: None,
        }
    }

    #[tokio::test]
    async fn test_loan_takes_and_return_releases_a_copy() {
        let repository = Repository::in_memory();
        let book_id = book_with_copies(&repository, 2).await;
        let loans = LoansService::new(repository.clone(), LoansConfig::default());
        let actor = student();

        let loan = loans.create_loan(actor, request(book_id)).await.unwrap();
        assert_eq!(loan.due_date - loan.reservation_date, Duration::days(14));
        assert_eq!(repository.books.get(book_id).await.unwrap().available_copies, 1);

        let err = loans.create_loan(actor, request(book_id)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateActive(_)));

        let returned = loans.return_loan(actor, loan.id).await.unwrap();
        assert_eq!(returned.status, LoanStatus::Returned);
        assert!(returned.return_date.is_some());
        assert_eq!(repository.books.get(book_id).await.unwrap().available_copies, 2);

        let again = loans.return_loan(actor, loan.id).await.unwrap_err();
        assert!(matches!(again, AppError::NotActive(_)));
    }

    #[tokio::test]
    async fn test_only_owner_or_admin_returns() {
        let repository = Repository::in_memory();
        let book_id = book_with_copies(&repository, 1).await;
        let loans = LoansService::new(repository, LoansConfig::default());
        let owner = student();
        let loan = loans.create_loan(owner, request(book_id)).await.unwrap();

        let err = loans.return_loan(student(), loan.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized(_)));

        let admin = Actor {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
        };
        assert!(loans.return_loan(admin, loan.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_loan_duration_is_bounded() {
        let repository = Repository::in_memory();
        let book_id = book_with_copies(&repository, 1).await;
        let loans = LoansService::new(repository, LoansConfig::default());
        for days in [0, -3, 91] {
            let err = loans
                .create_loan(
                    student(),
                    CreateLoan {
                        book_id,
                        days_to_return: Some(days),
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{} days accepted", days);
        }
    }

    #[tokio::test]
    async fn test_deleting_outstanding_loan_restores_copy() {
        let repository = Repository::in_memory();
        let book_id = book_with_copies(&repository, 1).await;
        let loans = LoansService::new(repository.clone(), LoansConfig::default());
        let loan = loans.create_loan(student(), request(book_id)).await.unwrap();
        assert_eq!(repository.books.get(book_id).await.unwrap().available_copies, 0);

        loans.delete_loan(loan.id).await.unwrap();
        assert_eq!(repository.books.get(book_id).await.unwrap().available_copies, 1);
    }

    #[tokio::test]
    async fn test_unavailable_book_never_reaches_the_store() {
        let mut repository = Repository::in_memory();
        let book_id = book_with_copies(&repository, 1).await;
        LoansService::new(repository.clone(), LoansConfig::default())
            .create_loan(student(), request(book_id))
            .await
            .unwrap();

        let mut mock = MockLoansRepository::new();
        mock.expect_find_outstanding().never();
        mock.expect_open().never();
        let mocked: Arc<dyn LoansRepository> = Arc::new(mock);
        repository.loans = mocked;

        let loans = LoansService::new(repository, LoansConfig::default());
        let err = loans.create_loan(student(), request(book_id)).await.unwrap_err();
        assert!(matches!(err, AppError::NotAvailable(_)));
    }
}
