//! Repository layer: the entity store boundary
//!
//! Each collection is a trait with a PostgreSQL implementation next to it and
//! an in-memory implementation in [`memory`]. Every method that touches a
//! counter or an exclusivity rule is a single atomic conditional operation;
//! it re-checks its guard at write time and reports a violated guard as the
//! matching domain error.

pub mod books;
pub mod events;
pub mod loans;
pub mod memory;
pub mod shelves;
pub mod study_rooms;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::error::AppResult;

pub use books::BooksRepository;
pub use events::EventsRepository;
pub use loans::LoansRepository;
pub use shelves::ShelvesRepository;
pub use study_rooms::{RoomReservationsRepository, StudyRoomsRepository};
pub use users::UsersRepository;

/// Main repository struct holding one handle per collection
#[derive(Clone)]
pub struct Repository {
    pool: Option<Pool<Postgres>>,
    pub users: Arc<dyn UsersRepository>,
    pub shelves: Arc<dyn ShelvesRepository>,
    pub books: Arc<dyn BooksRepository>,
    pub loans: Arc<dyn LoansRepository>,
    pub study_rooms: Arc<dyn StudyRoomsRepository>,
    pub room_reservations: Arc<dyn RoomReservationsRepository>,
    pub events: Arc<dyn EventsRepository>,
}

impl Repository {
    /// Create a repository backed by the given PostgreSQL pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(users::PgUsersRepository::new(pool.clone())),
            shelves: Arc::new(shelves::PgShelvesRepository::new(pool.clone())),
            books: Arc::new(books::PgBooksRepository::new(pool.clone())),
            loans: Arc::new(loans::PgLoansRepository::new(pool.clone())),
            study_rooms: Arc::new(study_rooms::PgStudyRoomsRepository::new(pool.clone())),
            room_reservations: Arc::new(study_rooms::PgRoomReservationsRepository::new(pool.clone())),
            events: Arc::new(events::PgEventsRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository backed by a fresh in-process store
    pub fn in_memory() -> Self {
        Self::from_memory(memory::MemoryStore::new())
    }

    /// Create a repository over an existing in-process store
    pub fn from_memory(store: memory::MemoryStore) -> Self {
        Self {
            pool: None,
            users: Arc::new(store.clone()),
            shelves: Arc::new(store.clone()),
            books: Arc::new(store.clone()),
            loans: Arc::new(store.clone()),
            study_rooms: Arc::new(store.clone()),
            room_reservations: Arc::new(store.clone()),
            events: Arc::new(store),
        }
    }

    /// Round-trip to the backing store
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

/// PostgreSQL `unique_violation`
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Name of the constraint a database error refers to, if any
pub(crate) fn violated_constraint(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.constraint().map(str::to_string),
        _ => None,
    }
}
