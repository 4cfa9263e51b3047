//! Counter audit and repair, and the background overdue sweeper
//!
//! `current_books`, `available_copies` and `current_attendees` are caches of
//! facts held by other records. The audit recomputes them from those records.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{loans::LoansService, optional};
use crate::{
    error::AppResult,
    models::maintenance::{ConsistencyReport, CounterMismatch},
    repository::Repository,
};

pub const SHELF_BOOKS: &str = "shelf.currentBooks";
pub const BOOK_AVAILABLE: &str = "book.availableCopies";
pub const EVENT_ATTENDEES: &str = "event.currentAttendees";

#[derive(Clone)]
pub struct MaintenanceService {
    repository: Repository,
}

impl MaintenanceService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Compare every stored counter with the value derived from its records
    pub async fn audit(&self) -> AppResult<ConsistencyReport> {
        let mut mismatches = Vec::new();

        let books = self.repository.books.list().await?;
        let mut books_per_shelf: HashMap<Uuid, i64> = HashMap::new();
        for book in &books {
            *books_per_shelf.entry(book.shelf_id).or_default() += 1;
        }
        for shelf in self.repository.shelves.list().await? {
            let expected = books_per_shelf.get(&shelf.id).copied().unwrap_or(0);
            if i64::from(shelf.current_books) != expected {
                mismatches.push(CounterMismatch {
                    entity_id: shelf.id,
                    counter: SHELF_BOOKS.to_string(),
                    stored: shelf.current_books.into(),
                    expected,
                });
            }
        }

        let mut outstanding: HashMap<Uuid, i64> = HashMap::new();
        for loan in self.repository.loans.list_all().await? {
            if loan.status.is_outstanding() {
                *outstanding.entry(loan.book_id).or_default() += 1;
            }
        }
        for book in &books {
            let expected = i64::from(book.copies) - outstanding.get(&book.id).copied().unwrap_or(0);
            if i64::from(book.available_copies) != expected {
                mismatches.push(CounterMismatch {
                    entity_id: book.id,
                    counter: BOOK_AVAILABLE.to_string(),
                    stored: book.available_copies.into(),
                    expected,
                });
            }
        }

        for event in self.repository.events.list().await? {
            let expected = event.attendees.len() as i64;
            if i64::from(event.current_attendees) != expected {
                mismatches.push(CounterMismatch {
                    entity_id: event.id,
                    counter: EVENT_ATTENDEES.to_string(),
                    stored: event.current_attendees.into(),
                    expected,
                });
            }
        }

        if !mismatches.is_empty() {
            tracing::warn!(count = mismatches.len(), "Counter audit found mismatches");
        }
        Ok(ConsistencyReport {
            mismatches,
            repaired: false,
        })
    }

    /// Recount every mismatching counter from its records.
    ///
    /// Each recount is one atomic store operation, so writes landing between
    /// the audit and the repair are counted rather than overwritten. The
    /// report carries the values actually written.
    pub async fn repair(&self) -> AppResult<ConsistencyReport> {
        let report = self.audit().await?;
        let mut repaired = Vec::with_capacity(report.mismatches.len());
        for mut mismatch in report.mismatches {
            let id = mismatch.entity_id;
            let written = match mismatch.counter.as_str() {
                SHELF_BOOKS => self.repository.shelves.recount_books(id).await,
                BOOK_AVAILABLE => self.repository.books.recount_available_copies(id).await,
                EVENT_ATTENDEES => self.repository.events.recount_attendees(id).await,
                _ => continue,
            };
            let written = match optional(written)? {
                Some(value) => value,
                // Deleted since the audit
                None => continue,
            };
            mismatch.expected = written.into();
            tracing::info!(
                entity_id = %id,
                counter = %mismatch.counter,
                from = mismatch.stored,
                to = mismatch.expected,
                "Repaired counter"
            );
            repaired.push(mismatch);
        }
        Ok(ConsistencyReport {
            mismatches: repaired,
            repaired: true,
        })
    }
}

/// Background task that periodically flags overdue loans
pub fn spawn_overdue_sweeper(loans: LoansService, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match loans.sweep_overdue(Utc::now()).await {
                Ok(result) => tracing::debug!(updated = result.updated_count, "Overdue sweep finished"),
                Err(e) => tracing::error!("Overdue sweep failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::{
        config::LoansConfig,
        models::{
            book::CreateBook,
            event::NewEvent,
            loan::{LoanStatus, NewLoan},
            shelf::CreateShelf,
        },
        repository::memory::MemoryStore,
    };

    async fn seeded() -> (MemoryStore, Repository, Uuid, Uuid) {
        let store = MemoryStore::new();
        let repository = Repository::from_memory(store.clone());
        let shelf = repository
            .shelves
            .create(&CreateShelf {
                shelf_number: "M1".into(),
                location: "Basement".into(),
                section: "Archive".into(),
                capacity: Some(10),
                description: None,
            })
            .await
            .unwrap();
        let book = repository
            .books
            .create_on_shelf(&CreateBook {
                title: "SICP".into(),
                author: "Abelson".into(),
                isbn: "0262510871".into(),
                published_year: 1985,
                genre: "Computer science".into(),
                copies: Some(3),
                shelf_id: shelf.id,
                description: None,
            })
            .await
            .unwrap();
        (store, repository, shelf.id, book.id)
    }

    async fn event_with_seats(repository: &Repository, max_attendees: i32) -> Uuid {
        repository
            .events
            .create(&NewEvent {
                title: "Lecture".into(),
                description: "Open lecture".into(),
                guest_id: Uuid::new_v4(),
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                start_time: "17:00".parse().unwrap(),
                end_time: "18:00".parse().unwrap(),
                location: "Hall".into(),
                max_attendees,
                category: "Science".into(),
                invitation_sent_at: Utc::now(),
            })
            .await
            .unwrap()
            .id
    }

    fn loan_for(book_id: Uuid) -> NewLoan {
        let now = Utc::now();
        NewLoan {
            user_id: Uuid::new_v4(),
            book_id,
            reservation_date: now,
            due_date: now + chrono::Duration::days(14),
        }
    }

    #[tokio::test]
    async fn test_consistent_store_has_no_mismatches() {
        let (_, repository, _, book_id) = seeded().await;
        repository.loans.open(&loan_for(book_id)).await.unwrap();
        let report = MaintenanceService::new(repository).audit().await.unwrap();
        assert!(report.is_consistent());
    }

    #[tokio::test]
    async fn test_repair_restores_drifted_counters() {
        let (store, repository, shelf_id, book_id) = seeded().await;
        store.drift_counter(SHELF_BOOKS, shelf_id, 7).await;
        store.drift_counter(BOOK_AVAILABLE, book_id, 1).await;

        let maintenance = MaintenanceService::new(repository.clone());
        let report = maintenance.repair().await.unwrap();
        assert_eq!(report.mismatches.len(), 2);
        assert!(report.repaired);

        assert!(maintenance.audit().await.unwrap().is_consistent());
        assert_eq!(repository.shelves.get(shelf_id).await.unwrap().current_books, 1);
        assert_eq!(repository.books.get(book_id).await.unwrap().available_copies, 3);
    }

    #[tokio::test]
    async fn test_recount_includes_writes_after_the_audit() {
        let (store, repository, _, book_id) = seeded().await;
        let event_id = event_with_seats(&repository, 2).await;
        repository.events.add_attendee(event_id, Uuid::new_v4()).await.unwrap();
        store.drift_counter(EVENT_ATTENDEES, event_id, 0).await;
        let loan = repository.loans.open(&loan_for(book_id)).await.unwrap();
        store.drift_counter(BOOK_AVAILABLE, book_id, 0).await;

        let maintenance = MaintenanceService::new(repository.clone());
        let report = maintenance.audit().await.unwrap();
        assert_eq!(report.mismatches.len(), 2);

        // Both land after the audit read its records
        repository.events.add_attendee(event_id, Uuid::new_v4()).await.unwrap();
        repository.loans.close(loan.id, Utc::now()).await.unwrap();

        assert_eq!(repository.events.recount_attendees(event_id).await.unwrap(), 2);
        assert_eq!(repository.books.recount_available_copies(book_id).await.unwrap(), 3);

        let err = repository.events.add_attendee(event_id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::EventFull));
        let event = repository.events.get(event_id).await.unwrap();
        assert_eq!(event.current_attendees as usize, event.attendees.len());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_repair_racing_registrations_keeps_seats_bounded() {
        let (_, repository, _, _) = seeded().await;
        let event_id = event_with_seats(&repository, 5).await;
        repository.events.add_attendee(event_id, Uuid::new_v4()).await.unwrap();

        let maintenance = Arc::new(MaintenanceService::new(repository.clone()));
        let mut handles = Vec::new();
        for i in 0..12 {
            if i % 3 == 0 {
                let maintenance = maintenance.clone();
                handles.push(tokio::spawn(async move {
                    maintenance.repair().await.unwrap();
                }));
            }
            let events = repository.events.clone();
            handles.push(tokio::spawn(async move {
                let _ = events.add_attendee(event_id, Uuid::new_v4()).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        maintenance.repair().await.unwrap();

        let event = repository.events.get(event_id).await.unwrap();
        assert_eq!(event.current_attendees as usize, event.attendees.len());
        assert!(event.attendees.len() <= 5, "{} attendees", event.attendees.len());
    }

    #[tokio::test]
    async fn test_sweeper_marks_late_loans() {
        let (_, repository, _, book_id) = seeded().await;
        let now = Utc::now();
        let loan = repository
            .loans
            .open(&NewLoan {
                user_id: Uuid::new_v4(),
                book_id,
                reservation_date: now - chrono::Duration::days(20),
                due_date: now - chrono::Duration::days(6),
            })
            .await
            .unwrap();

        let handle = spawn_overdue_sweeper(
            LoansService::new(repository.clone(), LoansConfig::default()),
            Duration::from_secs(60),
        );
        // The first tick fires immediately
        let mut status = LoanStatus::Active;
        for _ in 0..100 {
            status = repository.loans.get(loan.id).await.unwrap().status;
            if status == LoanStatus::Overdue {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(status, LoanStatus::Overdue);
    }
}
