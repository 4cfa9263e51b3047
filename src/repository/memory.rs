//! In-process implementation of every repository trait
//!
//! All collections sit behind one `RwLock`. Each trait method takes the lock
//! once, so its guard checks and writes form a single critical section, the
//! in-memory counterpart of the conditional statements used for PostgreSQL.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BooksRepository, EventsRepository, LoansRepository, RoomReservationsRepository, ShelvesRepository,
    StudyRoomsRepository, UsersRepository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, UpdateBook},
        event::{Event, EventStatus, InvitationStatus, NewEvent, UpdateEvent},
        loan::{Loan, LoanStatus, NewLoan},
        shelf::{CreateShelf, Shelf, UpdateShelf, DEFAULT_SHELF_CAPACITY},
        study_room::{
            CreateStudyRoom, NewRoomReservation, RoomReservation, RoomReservationStatus, StudyRoom,
            UpdateStudyRoom,
        },
        user::{NewUser, Role, UpdateGuestProfile, User},
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    shelves: HashMap<Uuid, Shelf>,
    books: HashMap<Uuid, Book>,
    loans: HashMap<Uuid, Loan>,
    study_rooms: HashMap<Uuid, StudyRoom>,
    room_reservations: HashMap<Uuid, RoomReservation>,
    events: HashMap<Uuid, Event>,
}

impl Tables {
    fn shelf_mut(&mut self, id: Uuid) -> AppResult<&mut Shelf> {
        self.shelves
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Shelf {} not found", id)))
    }

    fn book_mut(&mut self, id: Uuid) -> AppResult<&mut Book> {
        self.books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    fn loan(&self, id: Uuid) -> AppResult<&Loan> {
        self.loans
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))
    }

    fn room(&self, id: Uuid) -> AppResult<&StudyRoom> {
        self.study_rooms
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Study room {} not found", id)))
    }

    fn event_mut(&mut self, id: Uuid) -> AppResult<&mut Event> {
        self.events
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))
    }

    /// Same guard as the `current_books < capacity` conditional update
    fn claim_shelf_place(&mut self, shelf_id: Uuid) -> AppResult<()> {
        let shelf = self.shelf_mut(shelf_id)?;
        if !shelf.has_room() {
            return Err(AppError::CapacityExceeded(format!("Shelf {} is full", shelf.shelf_number)));
        }
        shelf.current_books += 1;
        Ok(())
    }

    fn release_shelf_place(&mut self, shelf_id: Uuid) {
        if let Some(shelf) = self.shelves.get_mut(&shelf_id) {
            if shelf.current_books > 0 {
                shelf.current_books -= 1;
            }
        }
    }

    fn release_copy(&mut self, book_id: Uuid) {
        if let Some(book) = self.books.get_mut(&book_id) {
            if book.available_copies < book.copies {
                book.available_copies += 1;
            } else {
                tracing::warn!(
                    book_id = %book_id,
                    copies = book.copies,
                    "Copy release skipped, available copies already at the owned total"
                );
            }
        }
    }

    fn isbn_taken(&self, isbn: &str, except: Option<Uuid>) -> bool {
        self.books
            .values()
            .any(|b| b.isbn == isbn && Some(b.id) != except)
    }
}

/// Shared in-memory entity store
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a stored counter out of step with its records
    #[cfg(test)]
    pub(crate) async fn drift_counter(&self, counter: &str, id: Uuid, value: i32) {
        use crate::services::maintenance::{BOOK_AVAILABLE, EVENT_ATTENDEES, SHELF_BOOKS};

        let mut tables = self.tables.write().await;
        match counter {
            SHELF_BOOKS => tables.shelves.get_mut(&id).map(|s| s.current_books = value),
            BOOK_AVAILABLE => tables.books.get_mut(&id).map(|b| b.available_copies = value),
            EVENT_ATTENDEES => tables.events.get_mut(&id).map(|e| e.current_attendees = value),
            _ => None,
        };
    }
}

fn sorted<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

fn newest_loans_first(mut loans: Vec<Loan>) -> Vec<Loan> {
    loans.sort_by(|a, b| {
        b.reservation_date
            .cmp(&a.reservation_date)
            .then_with(|| a.id.cmp(&b.id))
    });
    loans
}

fn latest_reservations_first(mut reservations: Vec<RoomReservation>) -> Vec<RoomReservation> {
    reservations.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.start_time.cmp(&b.start_time))
            .then_with(|| a.id.cmp(&b.id))
    });
    reservations
}

fn by_schedule(events: Vec<Event>) -> Vec<Event> {
    sorted(events, |e: &Event| (e.date, e.start_time, e.id))
}

#[async_trait]
impl UsersRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict(format!(
                "User with email {} already exists",
                user.email
            )));
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            expertise: user.expertise,
            bio: user.bio,
            organization: user.organization,
            is_available: true,
            created_at: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_by_role(&self, role: Role) -> AppResult<Vec<User>> {
        let tables = self.tables.read().await;
        let users = tables.users.values().filter(|u| u.role == role).cloned().collect();
        Ok(sorted(users, |u: &User| (u.username.clone(), u.id)))
    }

    async fn update_guest_profile(&self, id: Uuid, profile: &UpdateGuestProfile) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .filter(|u| u.role == Role::Guest)
            .ok_or_else(|| AppError::InvalidGuestRole(format!("User {} is not a guest", id)))?;
        if let Some(expertise) = &profile.expertise {
            user.expertise = expertise.clone();
        }
        if let Some(bio) = &profile.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(organization) = &profile.organization {
            user.organization = Some(organization.clone());
        }
        if let Some(is_available) = profile.is_available {
            user.is_available = is_available;
        }
        Ok(user.clone())
    }
}

#[async_trait]
impl ShelvesRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Shelf>> {
        let tables = self.tables.read().await;
        let shelves = tables.shelves.values().cloned().collect();
        Ok(sorted(shelves, |s: &Shelf| s.shelf_number.clone()))
    }

    async fn get(&self, id: Uuid) -> AppResult<Shelf> {
        let tables = self.tables.read().await;
        tables
            .shelves
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Shelf {} not found", id)))
    }

    async fn find_by_number(&self, shelf_number: &str) -> AppResult<Option<Shelf>> {
        let tables = self.tables.read().await;
        Ok(tables
            .shelves
            .values()
            .find(|s| s.shelf_number == shelf_number)
            .cloned())
    }

    async fn create(&self, data: &CreateShelf) -> AppResult<Shelf> {
        let mut tables = self.tables.write().await;
        if tables.shelves.values().any(|s| s.shelf_number == data.shelf_number) {
            return Err(AppError::Conflict(format!("Shelf {} already exists", data.shelf_number)));
        }
        let shelf = Shelf {
            id: Uuid::new_v4(),
            shelf_number: data.shelf_number.clone(),
            location: data.location.clone(),
            section: data.section.clone(),
            capacity: data.capacity.unwrap_or(DEFAULT_SHELF_CAPACITY),
            current_books: 0,
            description: data.description.clone(),
            created_at: Utc::now(),
        };
        tables.shelves.insert(shelf.id, shelf.clone());
        Ok(shelf)
    }

    async fn update(&self, id: Uuid, data: &UpdateShelf) -> AppResult<Shelf> {
        let mut tables = self.tables.write().await;
        if let Some(number) = &data.shelf_number {
            if tables
                .shelves
                .values()
                .any(|s| &s.shelf_number == number && s.id != id)
            {
                return Err(AppError::Conflict("Shelf number already in use".to_string()));
            }
        }
        let shelf = tables.shelf_mut(id)?;
        if let Some(capacity) = data.capacity {
            if capacity < shelf.current_books {
                return Err(AppError::CapacityExceeded(format!(
                    "Shelf {} holds {} books, capacity cannot be lower",
                    shelf.shelf_number, shelf.current_books
                )));
            }
            shelf.capacity = capacity;
        }
        if let Some(number) = &data.shelf_number {
            shelf.shelf_number = number.clone();
        }
        if let Some(location) = &data.location {
            shelf.location = location.clone();
        }
        if let Some(section) = &data.section {
            shelf.section = section.clone();
        }
        if let Some(description) = &data.description {
            shelf.description = Some(description.clone());
        }
        Ok(shelf.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.shelf_mut(id)?;
        let books = tables.books.values().filter(|b| b.shelf_id == id).count();
        if books > 0 {
            return Err(AppError::NotEmpty(format!(
                "Cannot delete shelf. There are {} book(s) on this shelf",
                books
            )));
        }
        tables.shelves.remove(&id);
        Ok(())
    }

    async fn recount_books(&self, id: Uuid) -> AppResult<i32> {
        let mut tables = self.tables.write().await;
        let count = tables.books.values().filter(|b| b.shelf_id == id).count() as i32;
        let shelf = tables.shelf_mut(id)?;
        shelf.current_books = count;
        Ok(count)
    }
}

#[async_trait]
impl BooksRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Book>> {
        let tables = self.tables.read().await;
        let books = tables.books.values().cloned().collect();
        Ok(sorted(books, |b: &Book| (b.title.clone(), b.id)))
    }

    async fn get(&self, id: Uuid) -> AppResult<Book> {
        let tables = self.tables.read().await;
        tables
            .books
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let tables = self.tables.read().await;
        Ok(tables.books.values().find(|b| b.isbn == isbn).cloned())
    }

    async fn list_on_shelf(&self, shelf_id: Uuid) -> AppResult<Vec<Book>> {
        let tables = self.tables.read().await;
        let books = tables
            .books
            .values()
            .filter(|b| b.shelf_id == shelf_id)
            .cloned()
            .collect();
        Ok(sorted(books, |b: &Book| (b.title.clone(), b.id)))
    }

    async fn create_on_shelf(&self, data: &CreateBook) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        if tables.isbn_taken(&data.isbn, None) {
            return Err(AppError::Conflict(format!(
                "Book with ISBN {} already exists",
                data.isbn
            )));
        }
        tables.claim_shelf_place(data.shelf_id)?;

        let copies = data.copies.unwrap_or(1);
        let book = Book {
            id: Uuid::new_v4(),
            title: data.title.clone(),
            author: data.author.clone(),
            isbn: data.isbn.clone(),
            published_year: data.published_year,
            genre: data.genre.clone(),
            copies,
            available_copies: copies,
            shelf_id: data.shelf_id,
            description: data.description.clone(),
            created_at: Utc::now(),
        };
        tables.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update(&self, id: Uuid, data: &UpdateBook) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        if let Some(isbn) = &data.isbn {
            if tables.isbn_taken(isbn, Some(id)) {
                return Err(AppError::Conflict(format!("Book with ISBN {} already exists", isbn)));
            }
        }
        let book = tables.book_mut(id)?;
        if let Some(title) = &data.title {
            book.title = title.clone();
        }
        if let Some(author) = &data.author {
            book.author = author.clone();
        }
        if let Some(isbn) = &data.isbn {
            book.isbn = isbn.clone();
        }
        if let Some(year) = data.published_year {
            book.published_year = year;
        }
        if let Some(genre) = &data.genre {
            book.genre = genre.clone();
        }
        if let Some(description) = &data.description {
            book.description = Some(description.clone());
        }
        Ok(book.clone())
    }

    async fn set_copies(&self, id: Uuid, copies: i32) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        let book = tables.book_mut(id)?;
        let available = book.available_copies + (copies - book.copies);
        if available < 0 {
            return Err(AppError::CapacityExceeded(format!(
                "{} copies of '{}' are on loan, cannot reduce to {}",
                book.copies_on_loan(),
                book.title,
                copies
            )));
        }
        book.copies = copies;
        book.available_copies = available;
        Ok(book.clone())
    }

    async fn move_to_shelf(&self, id: Uuid, shelf_id: Uuid) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        let old_shelf = tables.book_mut(id)?.shelf_id;
        if old_shelf != shelf_id {
            tables.claim_shelf_place(shelf_id)?;
            tables.release_shelf_place(old_shelf);
        }
        let book = tables.book_mut(id)?;
        book.shelf_id = shelf_id;
        Ok(book.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let book = tables.book_mut(id)?.clone();
        let outstanding = tables
            .loans
            .values()
            .filter(|l| l.book_id == id && l.status.is_outstanding())
            .count();
        if outstanding > 0 {
            return Err(AppError::InvalidStateTransition(format!(
                "Book '{}' has {} outstanding loan(s)",
                book.title, outstanding
            )));
        }
        tables.loans.retain(|_, l| l.book_id != id);
        tables.books.remove(&id);
        tables.release_shelf_place(book.shelf_id);
        Ok(())
    }

    async fn recount_available_copies(&self, id: Uuid) -> AppResult<i32> {
        let mut tables = self.tables.write().await;
        let outstanding = tables
            .loans
            .values()
            .filter(|l| l.book_id == id && l.status.is_outstanding())
            .count() as i32;
        let book = tables.book_mut(id)?;
        book.available_copies = (book.copies - outstanding).max(0);
        Ok(book.available_copies)
    }
}

#[async_trait]
impl LoansRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Loan> {
        let tables = self.tables.read().await;
        tables.loan(id).cloned()
    }

    async fn list_all(&self) -> AppResult<Vec<Loan>> {
        let tables = self.tables.read().await;
        Ok(newest_loans_first(tables.loans.values().cloned().collect()))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Loan>> {
        let tables = self.tables.read().await;
        let loans = tables
            .loans
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_loans_first(loans))
    }

    async fn find_outstanding(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Loan>> {
        let tables = self.tables.read().await;
        Ok(tables
            .loans
            .values()
            .find(|l| l.user_id == user_id && l.book_id == book_id && l.status.is_outstanding())
            .cloned())
    }

    async fn open(&self, loan: &NewLoan) -> AppResult<Loan> {
        let mut tables = self.tables.write().await;
        let book = tables.book_mut(loan.book_id)?;
        if book.available_copies <= 0 {
            return Err(AppError::NotAvailable(format!(
                "No copies of '{}' are available",
                book.title
            )));
        }
        if tables
            .loans
            .values()
            .any(|l| l.user_id == loan.user_id && l.book_id == loan.book_id && l.status.is_outstanding())
        {
            return Err(AppError::DuplicateActive("You already have this book on loan".to_string()));
        }

        tables.book_mut(loan.book_id)?.available_copies -= 1;
        let created = Loan {
            id: Uuid::new_v4(),
            user_id: loan.user_id,
            book_id: loan.book_id,
            reservation_date: loan.reservation_date,
            due_date: loan.due_date,
            return_date: None,
            status: LoanStatus::Active,
        };
        tables.loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn close(&self, id: Uuid, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        let mut tables = self.tables.write().await;
        let current = tables.loan(id)?;
        if !current.status.is_outstanding() {
            return Err(AppError::NotActive(format!(
                "Loan {} is already {:?}",
                id, current.status
            )));
        }
        let book_id = current.book_id;
        let closed = {
            let loan = tables
                .loans
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))?;
            loan.status = LoanStatus::Returned;
            loan.return_date = Some(returned_at);
            loan.clone()
        };
        tables.release_copy(book_id);
        Ok(closed)
    }

    async fn remove(&self, id: Uuid) -> AppResult<Loan> {
        let mut tables = self.tables.write().await;
        let loan = tables
            .loans
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))?;
        if loan.status.is_outstanding() {
            tables.release_copy(loan.book_id);
        }
        Ok(loan)
    }

    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;
        for loan in tables.loans.values_mut() {
            if loan.status == LoanStatus::Active && loan.due_date < now {
                loan.status = LoanStatus::Overdue;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl StudyRoomsRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<StudyRoom>> {
        let tables = self.tables.read().await;
        let rooms = tables.study_rooms.values().cloned().collect();
        Ok(sorted(rooms, |r: &StudyRoom| r.room_number.clone()))
    }

    async fn get(&self, id: Uuid) -> AppResult<StudyRoom> {
        let tables = self.tables.read().await;
        tables.room(id).cloned()
    }

    async fn find_by_number(&self, room_number: &str) -> AppResult<Option<StudyRoom>> {
        let tables = self.tables.read().await;
        Ok(tables
            .study_rooms
            .values()
            .find(|r| r.room_number == room_number)
            .cloned())
    }

    async fn create(&self, data: &CreateStudyRoom) -> AppResult<StudyRoom> {
        let mut tables = self.tables.write().await;
        if tables.study_rooms.values().any(|r| r.room_number == data.room_number) {
            return Err(AppError::Conflict("Room number already in use".to_string()));
        }
        let room = StudyRoom {
            id: Uuid::new_v4(),
            room_number: data.room_number.clone(),
            name: data.name.clone(),
            capacity: data.capacity,
            facilities: data.facilities.clone(),
            is_available: true,
            description: data.description.clone(),
            created_at: Utc::now(),
        };
        tables.study_rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn update(&self, id: Uuid, data: &UpdateStudyRoom) -> AppResult<StudyRoom> {
        let mut tables = self.tables.write().await;
        if let Some(number) = &data.room_number {
            if tables
                .study_rooms
                .values()
                .any(|r| &r.room_number == number && r.id != id)
            {
                return Err(AppError::Conflict("Room number already in use".to_string()));
            }
        }
        let room = tables
            .study_rooms
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Study room {} not found", id)))?;
        if let Some(number) = &data.room_number {
            room.room_number = number.clone();
        }
        if let Some(name) = &data.name {
            room.name = name.clone();
        }
        if let Some(capacity) = data.capacity {
            room.capacity = capacity;
        }
        if let Some(facilities) = &data.facilities {
            room.facilities = facilities.clone();
        }
        if let Some(is_available) = data.is_available {
            room.is_available = is_available;
        }
        if let Some(description) = &data.description {
            room.description = Some(description.clone());
        }
        Ok(room.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let room_number = tables.room(id)?.room_number.clone();
        let active = tables
            .room_reservations
            .values()
            .filter(|r| r.study_room_id == id && r.status == RoomReservationStatus::Active)
            .count();
        if active > 0 {
            return Err(AppError::InvalidStateTransition(format!(
                "Study room {} has {} active reservation(s)",
                room_number, active
            )));
        }
        tables.room_reservations.retain(|_, r| r.study_room_id != id);
        tables.study_rooms.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl RoomReservationsRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<RoomReservation> {
        let tables = self.tables.read().await;
        tables
            .room_reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Room reservation {} not found", id)))
    }

    async fn list_all(&self) -> AppResult<Vec<RoomReservation>> {
        let tables = self.tables.read().await;
        Ok(latest_reservations_first(
            tables.room_reservations.values().cloned().collect(),
        ))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<RoomReservation>> {
        let tables = self.tables.read().await;
        let reservations = tables
            .room_reservations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(latest_reservations_first(reservations))
    }

    async fn list_active_for_room(&self, study_room_id: Uuid, date: NaiveDate) -> AppResult<Vec<RoomReservation>> {
        let tables = self.tables.read().await;
        let reservations = tables
            .room_reservations
            .values()
            .filter(|r| {
                r.study_room_id == study_room_id
                    && r.date == date
                    && r.status == RoomReservationStatus::Active
            })
            .cloned()
            .collect();
        Ok(sorted(reservations, |r: &RoomReservation| (r.start_time, r.id)))
    }

    async fn find_active_for_user(&self, user_id: Uuid) -> AppResult<Option<RoomReservation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .room_reservations
            .values()
            .find(|r| r.user_id == user_id && r.status == RoomReservationStatus::Active)
            .cloned())
    }

    async fn book(&self, reservation: &NewRoomReservation) -> AppResult<RoomReservation> {
        let mut tables = self.tables.write().await;
        if !tables.room(reservation.study_room_id)?.is_available {
            return Err(AppError::RoomUnavailable);
        }
        let active: Vec<&RoomReservation> = tables
            .room_reservations
            .values()
            .filter(|r| r.status == RoomReservationStatus::Active)
            .collect();
        if active.iter().any(|r| r.user_id == reservation.user_id) {
            return Err(AppError::UserAlreadyBooked);
        }
        if active.iter().any(|r| {
            r.study_room_id == reservation.study_room_id
                && r.date == reservation.date
                && r.range().overlaps(&reservation.range)
        }) {
            return Err(AppError::SlotConflict);
        }

        let created = RoomReservation {
            id: Uuid::new_v4(),
            user_id: reservation.user_id,
            study_room_id: reservation.study_room_id,
            date: reservation.date,
            start_time: reservation.range.start_time,
            end_time: reservation.range.end_time,
            status: RoomReservationStatus::Active,
            purpose: reservation.purpose.clone(),
            created_at: Utc::now(),
        };
        tables.room_reservations.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_status(&self, id: Uuid, status: RoomReservationStatus) -> AppResult<RoomReservation> {
        let mut tables = self.tables.write().await;
        let reservation = tables
            .room_reservations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Room reservation {} not found", id)))?;
        if reservation.status != RoomReservationStatus::Active {
            return Err(AppError::NotActive(format!(
                "Room reservation {} is already {:?}",
                id, reservation.status
            )));
        }
        reservation.status = status;
        Ok(reservation.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<RoomReservation> {
        let mut tables = self.tables.write().await;
        tables
            .room_reservations
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Room reservation {} not found", id)))
    }
}

#[async_trait]
impl EventsRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Event>> {
        let tables = self.tables.read().await;
        Ok(by_schedule(tables.events.values().cloned().collect()))
    }

    async fn get(&self, id: Uuid) -> AppResult<Event> {
        let tables = self.tables.read().await;
        tables
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))
    }

    async fn list_for_attendee(&self, user_id: Uuid) -> AppResult<Vec<Event>> {
        let tables = self.tables.read().await;
        let events = tables
            .events
            .values()
            .filter(|e| e.has_attendee(user_id))
            .cloned()
            .collect();
        Ok(by_schedule(events))
    }

    async fn list_for_guest(&self, guest_id: Uuid) -> AppResult<Vec<Event>> {
        let tables = self.tables.read().await;
        let events = tables
            .events
            .values()
            .filter(|e| e.guest_id == guest_id)
            .cloned()
            .collect();
        Ok(by_schedule(events))
    }

    async fn create(&self, event: &NewEvent) -> AppResult<Event> {
        let mut tables = self.tables.write().await;
        let created = Event {
            id: Uuid::new_v4(),
            title: event.title.clone(),
            description: event.description.clone(),
            guest_id: event.guest_id,
            date: event.date,
            start_time: event.start_time,
            end_time: event.end_time,
            location: event.location.clone(),
            max_attendees: event.max_attendees,
            current_attendees: 0,
            attendees: Vec::new(),
            status: EventStatus::Upcoming,
            category: event.category.clone(),
            invitation_status: InvitationStatus::Pending,
            invitation_sent_at: event.invitation_sent_at,
            invitation_responded_at: None,
            is_visible_to_students: false,
            created_at: Utc::now(),
        };
        tables.events.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, data: &UpdateEvent) -> AppResult<Event> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        if let Some(max) = data.max_attendees {
            if max < event.current_attendees {
                return Err(AppError::CapacityExceeded(format!(
                    "{} attendees are registered, max attendees cannot be lower",
                    event.current_attendees
                )));
            }
            event.max_attendees = max;
        }
        if let Some(title) = &data.title {
            event.title = title.clone();
        }
        if let Some(description) = &data.description {
            event.description = description.clone();
        }
        if let Some(date) = data.date {
            event.date = date;
        }
        if let Some(start) = data.start_time {
            event.start_time = start;
        }
        if let Some(end) = data.end_time {
            event.end_time = end;
        }
        if let Some(location) = &data.location {
            event.location = location.clone();
        }
        if let Some(category) = &data.category {
            event.category = category.clone();
        }
        Ok(event.clone())
    }

    async fn set_status(&self, id: Uuid, from: EventStatus, to: EventStatus) -> AppResult<Event> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        if event.status != from {
            return Err(AppError::InvalidStateTransition(format!(
                "event is {:?}, expected {:?}",
                event.status, from
            )));
        }
        event.status = to;
        Ok(event.clone())
    }

    async fn add_attendee(&self, id: Uuid, user_id: Uuid) -> AppResult<Event> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        if event.status != EventStatus::Upcoming {
            return Err(AppError::EventNotOpen);
        }
        if event.has_attendee(user_id) {
            return Err(AppError::AlreadyRegistered);
        }
        if event.is_full() {
            return Err(AppError::EventFull);
        }
        event.attendees.push(user_id);
        event.current_attendees += 1;
        Ok(event.clone())
    }

    async fn remove_attendee(&self, id: Uuid, user_id: Uuid) -> AppResult<Event> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        if event.status != EventStatus::Upcoming {
            return Err(AppError::EventNotOpen);
        }
        if !event.has_attendee(user_id) {
            return Err(AppError::NotRegistered);
        }
        event.attendees.retain(|a| *a != user_id);
        event.current_attendees -= 1;
        Ok(event.clone())
    }

    async fn respond_invitation(
        &self,
        id: Uuid,
        guest_id: Uuid,
        response: InvitationStatus,
        responded_at: DateTime<Utc>,
    ) -> AppResult<Event> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        if event.guest_id != guest_id {
            return Err(AppError::NotInvited);
        }
        if event.invitation_status != InvitationStatus::Pending {
            return Err(AppError::InvalidStateTransition(format!(
                "invitation was already {:?}",
                event.invitation_status
            )));
        }
        event.invitation_status = response;
        event.invitation_responded_at = Some(responded_at);
        event.is_visible_to_students = response == InvitationStatus::Accepted;
        Ok(event.clone())
    }

    async fn reassign_guest(&self, id: Uuid, guest_id: Uuid, sent_at: DateTime<Utc>) -> AppResult<Event> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        if event.status.is_terminal() {
            return Err(AppError::InvalidStateTransition(format!(
                "cannot change the guest of a {:?} event",
                event.status
            )));
        }
        event.guest_id = guest_id;
        event.invitation_status = InvitationStatus::Pending;
        event.invitation_sent_at = sent_at;
        event.invitation_responded_at = None;
        event.is_visible_to_students = false;
        Ok(event.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .events
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))
    }

    async fn recount_attendees(&self, id: Uuid) -> AppResult<i32> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        event.current_attendees = event.attendees.len() as i32;
        Ok(event.current_attendees)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::time::{TimeOfDay, TimeRange};

    async fn shelf(store: &MemoryStore, number: &str, capacity: i32) -> Shelf {
        ShelvesRepository::create(
            store,
            &CreateShelf {
                shelf_number: number.into(),
                location: "Floor 1".into(),
                section: "Science".into(),
                capacity: Some(capacity),
                description: None,
            },
        )
        .await
        .unwrap()
    }

    fn book_on(shelf_id: Uuid, isbn: &str, copies: i32) -> CreateBook {
        CreateBook {
            title: format!("Book {}", isbn),
            author: "Author".into(),
            isbn: isbn.into(),
            published_year: 2001,
            genre: "Fiction".into(),
            copies: Some(copies),
            shelf_id,
            description: None,
        }
    }

    fn new_loan(user_id: Uuid, book_id: Uuid, due_in_days: i64) -> NewLoan {
        let now = Utc::now();
        NewLoan {
            user_id,
            book_id,
            reservation_date: now,
            due_date: now + Duration::days(due_in_days),
        }
    }

    #[tokio::test]
    async fn test_move_to_full_shelf_changes_nothing() {
        let store = MemoryStore::new();
        let a = shelf(&store, "A1", 2).await;
        let b = shelf(&store, "B1", 1).await;
        let book = store.create_on_shelf(&book_on(a.id, "1", 1)).await.unwrap();
        store.create_on_shelf(&book_on(b.id, "2", 1)).await.unwrap();

        let err = store.move_to_shelf(book.id, b.id).await.unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_)));
        assert_eq!(ShelvesRepository::get(&store, a.id).await.unwrap().current_books, 1);
        assert_eq!(ShelvesRepository::get(&store, b.id).await.unwrap().current_books, 1);
        assert_eq!(BooksRepository::get(&store, book.id).await.unwrap().shelf_id, a.id);
    }

    #[tokio::test]
    async fn test_close_twice_releases_one_copy() {
        let store = MemoryStore::new();
        let s = shelf(&store, "A1", 5).await;
        let book = store.create_on_shelf(&book_on(s.id, "1", 2)).await.unwrap();
        let loan = store.open(&new_loan(Uuid::new_v4(), book.id, 14)).await.unwrap();

        store.close(loan.id, Utc::now()).await.unwrap();
        let err = store.close(loan.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotActive(_)));
        assert_eq!(BooksRepository::get(&store, book.id).await.unwrap().available_copies, 2);
    }

    #[tokio::test]
    async fn test_release_on_drifted_counter_stays_within_copies() {
        use crate::services::maintenance::BOOK_AVAILABLE;

        let store = MemoryStore::new();
        let s = shelf(&store, "A1", 5).await;
        let book = store.create_on_shelf(&book_on(s.id, "1", 2)).await.unwrap();
        let loan = store.open(&new_loan(Uuid::new_v4(), book.id, 14)).await.unwrap();
        store.drift_counter(BOOK_AVAILABLE, book.id, 2).await;

        store.close(loan.id, Utc::now()).await.unwrap();
        assert_eq!(BooksRepository::get(&store, book.id).await.unwrap().available_copies, 2);
        assert_eq!(store.recount_available_copies(book.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_recount_books_follows_the_shelf() {
        use crate::services::maintenance::SHELF_BOOKS;

        let store = MemoryStore::new();
        let s = shelf(&store, "A1", 5).await;
        store.create_on_shelf(&book_on(s.id, "1", 1)).await.unwrap();
        store.create_on_shelf(&book_on(s.id, "2", 1)).await.unwrap();
        store.drift_counter(SHELF_BOOKS, s.id, 4).await;

        assert_eq!(store.recount_books(s.id).await.unwrap(), 2);
        assert_eq!(ShelvesRepository::get(&store, s.id).await.unwrap().current_books, 2);
        assert!(matches!(
            store.recount_books(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_overdue_skips_returned_loans() {
        let store = MemoryStore::new();
        let s = shelf(&store, "A1", 5).await;
        let book = store.create_on_shelf(&book_on(s.id, "1", 3)).await.unwrap();
        let late = store.open(&new_loan(Uuid::new_v4(), book.id, -1)).await.unwrap();
        let returned = store.open(&new_loan(Uuid::new_v4(), book.id, -1)).await.unwrap();
        store.close(returned.id, Utc::now()).await.unwrap();

        assert_eq!(store.mark_overdue(Utc::now()).await.unwrap(), 1);
        assert_eq!(LoansRepository::get(&store, late.id).await.unwrap().status, LoanStatus::Overdue);
        assert_eq!(
            LoansRepository::get(&store, returned.id).await.unwrap().status,
            LoanStatus::Returned
        );
    }

    #[tokio::test]
    async fn test_cancelled_booking_frees_the_slot() {
        let store = MemoryStore::new();
        let room = StudyRoomsRepository::create(
            &store,
            &CreateStudyRoom {
                room_number: "R1".into(),
                name: "Quiet room".into(),
                capacity: 4,
                facilities: vec![],
                description: None,
            },
        )
        .await
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let range = TimeRange::new(
            TimeOfDay::from_hm(10, 0).unwrap(),
            TimeOfDay::from_hm(11, 0).unwrap(),
        )
        .unwrap();
        let request = |user_id| NewRoomReservation {
            user_id,
            study_room_id: room.id,
            date,
            range,
            purpose: None,
        };

        let first = store.book(&request(Uuid::new_v4())).await.unwrap();
        assert!(matches!(
            store.book(&request(Uuid::new_v4())).await.unwrap_err(),
            AppError::SlotConflict
        ));
        RoomReservationsRepository::set_status(&store, first.id, RoomReservationStatus::Cancelled)
            .await
            .unwrap();
        assert!(store.book(&request(Uuid::new_v4())).await.is_ok());
    }
}
