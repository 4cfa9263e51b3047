//! Engine behaviour against the in-memory store: the documented scenarios,
//! the counter invariants and concurrent callers racing for the last unit.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use campus_library_server::{
    config::AppConfig,
    error::AppError,
    models::{
        book::CreateBook,
        event::{CreateEvent, EventStatus, InvitationResponse, InvitationStatus},
        loan::{CreateLoan, LoanStatus},
        shelf::CreateShelf,
        study_room::{CreateRoomReservation, CreateStudyRoom, RoomReservationStatus},
        user::{Actor, NewUser, Role},
        TimeOfDay,
    },
    repository::Repository,
    services::Services,
};

fn services() -> (Arc<Services>, Repository) {
    let repository = Repository::in_memory();
    let services = Services::new(repository.clone(), &AppConfig::default());
    (Arc::new(services), repository)
}

async fn account(repository: &Repository, role: Role) -> Actor {
    let id = Uuid::new_v4();
    repository
        .users
        .create(NewUser {
            username: format!("user-{}", id.simple()),
            email: format!("{}@campus.edu", id.simple()),
            password_hash: String::new(),
            role,
            expertise: Vec::new(),
            bio: None,
            organization: None,
        })
        .await
        .unwrap()
        .actor()
}

async fn shelf(services: &Services, number: &str, capacity: i32) -> Uuid {
    services
        .catalog
        .create_shelf(CreateShelf {
            shelf_number: number.into(),
            location: "Level 1".into(),
            section: "General".into(),
            capacity: Some(capacity),
            description: None,
        })
        .await
        .unwrap()
        .id
}

fn book(shelf_id: Uuid, isbn: &str, copies: i32) -> CreateBook {
    CreateBook {
        title: format!("Book {}", isbn),
        author: "Anonymous".into(),
        isbn: isbn.into(),
        published_year: 2001,
        genre: "Essay".into(),
        copies: Some(copies),
        shelf_id,
        description: None,
    }
}

fn borrow(book_id: Uuid) -> CreateLoan {
    CreateLoan {
        book_id,
        days_to_return: None,
    }
}

fn t(s: &str) -> TimeOfDay {
    s.parse().unwrap()
}

fn jan_10() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
}

async fn room(services: &Services) -> Uuid {
    services
        .study_rooms
        .create_room(CreateStudyRoom {
            room_number: format!("R-{}", Uuid::new_v4().simple()),
            name: "Quiet room".into(),
            capacity: 4,
            facilities: Vec::new(),
            description: None,
        })
        .await
        .unwrap()
        .id
}

fn slot(room_id: Uuid, start: &str, end: &str) -> CreateRoomReservation {
    CreateRoomReservation {
        study_room_id: room_id,
        date: jan_10(),
        start_time: t(start),
        end_time: t(end),
        purpose: None,
    }
}

fn event_for(guest_id: Uuid, max_attendees: i32) -> CreateEvent {
    CreateEvent {
        title: "Meet the author".into(),
        description: "Reading and Q&A".into(),
        guest_id,
        date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
        start_time: t("18:00"),
        end_time: t("19:30"),
        location: "Reading room".into(),
        max_attendees: Some(max_attendees),
        category: "Literature".into(),
    }
}

#[tokio::test]
async fn scenario_a_last_copy_goes_to_one_borrower() {
    let (services, repository) = services();
    let shelf_id = shelf(&services, "A1", 10).await;
    let book = services.catalog.create_book(book(shelf_id, "isbn-a", 1)).await.unwrap();
    let user_a = account(&repository, Role::Student).await;
    let user_b = account(&repository, Role::Student).await;

    services.loans.create_loan(user_a, borrow(book.id)).await.unwrap();
    assert_eq!(services.catalog.get_book(book.id).await.unwrap().book.available_copies, 0);

    let err = services.loans.create_loan(user_b, borrow(book.id)).await.unwrap_err();
    assert!(matches!(err, AppError::NotAvailable(_)));
}

#[tokio::test]
async fn scenario_b_full_shelf_keeps_its_count() {
    let (services, _) = services();
    let shelf_id = shelf(&services, "B1", 1).await;
    services.catalog.create_book(book(shelf_id, "isbn-b1", 1)).await.unwrap();

    let err = services
        .catalog
        .create_book(book(shelf_id, "isbn-b2", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded(_)));

    let details = services.catalog.get_shelf(shelf_id).await.unwrap();
    assert_eq!(details.shelf.current_books, 1);
    assert_eq!(details.books.len(), 1);
}

#[tokio::test]
async fn scenario_c_overlap_conflicts_and_adjacent_slot_books() {
    let (services, repository) = services();
    let room_id = room(&services).await;
    let first = account(&repository, Role::Student).await;
    let second = account(&repository, Role::Student).await;
    let third = account(&repository, Role::Student).await;

    services
        .study_rooms
        .create_reservation(first, slot(room_id, "10:00", "11:00"))
        .await
        .unwrap();

    let err = services
        .study_rooms
        .create_reservation(second, slot(room_id, "10:30", "11:30"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SlotConflict));

    let adjacent = services
        .study_rooms
        .create_reservation(third, slot(room_id, "11:00", "12:00"))
        .await
        .unwrap();
    assert_eq!(adjacent.status, RoomReservationStatus::Active);
}

#[tokio::test]
async fn scenario_d_last_seat() {
    let (services, repository) = services();
    let guest = account(&repository, Role::Guest).await;
    let event = services.events.create_event(event_for(guest.user_id, 1)).await.unwrap();
    let user_a = account(&repository, Role::Student).await;
    let user_b = account(&repository, Role::Student).await;

    let registered = services.events.register(user_a, event.id).await.unwrap();
    assert_eq!(registered.current_attendees, 1);

    let err = services.events.register(user_b, event.id).await.unwrap_err();
    assert!(matches!(err, AppError::EventFull));
}

#[tokio::test]
async fn scenario_e_overdue_loan_can_still_be_returned() {
    let (services, repository) = services();
    let shelf_id = shelf(&services, "E1", 10).await;
    let book = services.catalog.create_book(book(shelf_id, "isbn-e", 1)).await.unwrap();
    let borrower = account(&repository, Role::Student).await;

    let loan = services.loans.create_loan(borrower, borrow(book.id)).await.unwrap();
    let later = loan.due_date + Duration::days(1);

    assert_eq!(services.loans.sweep_overdue(later).await.unwrap().updated_count, 1);
    let mine = services.loans.list_for_user(borrower.user_id).await.unwrap();
    assert_eq!(mine[0].loan.status, LoanStatus::Overdue);

    let returned = services.loans.return_loan(borrower, loan.id).await.unwrap();
    assert_eq!(returned.status, LoanStatus::Returned);
    assert_eq!(services.catalog.get_book(book.id).await.unwrap().book.available_copies, 1);
}

#[tokio::test]
async fn scenario_f_declined_event_stays_hidden() {
    let (services, repository) = services();
    let guest = account(&repository, Role::Guest).await;
    let admin = account(&repository, Role::Admin).await;
    let student = account(&repository, Role::Student).await;
    let event = services.events.create_event(event_for(guest.user_id, 20)).await.unwrap();

    let declined = services
        .events
        .respond_to_invitation(guest, event.id, InvitationResponse::Declined)
        .await
        .unwrap();
    assert_eq!(declined.invitation_status, InvitationStatus::Declined);
    assert!(!declined.is_visible_to_students);

    assert!(services.events.list_visible(Some(student)).await.unwrap().is_empty());
    assert!(services.events.list_visible(None).await.unwrap().is_empty());
    assert_eq!(services.events.list_visible(Some(admin)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sweep_is_idempotent_for_the_same_clock() {
    let (services, repository) = services();
    let shelf_id = shelf(&services, "S1", 10).await;
    let first = services.catalog.create_book(book(shelf_id, "isbn-s1", 2)).await.unwrap();
    let second = services.catalog.create_book(book(shelf_id, "isbn-s2", 2)).await.unwrap();
    let borrower = account(&repository, Role::Student).await;

    services.loans.create_loan(borrower, borrow(first.id)).await.unwrap();
    services
        .loans
        .create_loan(
            borrower,
            CreateLoan {
                book_id: second.id,
                days_to_return: Some(60),
            },
        )
        .await
        .unwrap();

    let now = Utc::now() + Duration::days(30);
    assert_eq!(services.loans.sweep_overdue(now).await.unwrap().updated_count, 1);
    assert_eq!(services.loans.sweep_overdue(now).await.unwrap().updated_count, 0);

    let overdue = services
        .loans
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.loan.status == LoanStatus::Overdue)
        .count();
    assert_eq!(overdue, 1);
}

#[tokio::test]
async fn copy_and_shelf_counters_follow_their_records() {
    let (services, repository) = services();
    let left = shelf(&services, "L", 3).await;
    let right = shelf(&services, "R", 3).await;
    let a = services.catalog.create_book(book(left, "isbn-1", 3)).await.unwrap();
    let b = services.catalog.create_book(book(left, "isbn-2", 1)).await.unwrap();
    let users = [
        account(&repository, Role::Student).await,
        account(&repository, Role::Student).await,
        account(&repository, Role::Student).await,
    ];

    let l1 = services.loans.create_loan(users[0], borrow(a.id)).await.unwrap();
    let l2 = services.loans.create_loan(users[1], borrow(a.id)).await.unwrap();
    services.loans.create_loan(users[2], borrow(a.id)).await.unwrap();
    services.loans.return_loan(users[0], l1.id).await.unwrap();
    services.loans.delete_loan(l2.id).await.unwrap();
    services.loans.create_loan(users[0], borrow(b.id)).await.unwrap();

    services.catalog.move_book(b.id, right).await.unwrap();
    services.catalog.create_book(book(right, "isbn-3", 1)).await.unwrap();

    let report = services.maintenance.audit().await.unwrap();
    assert!(report.is_consistent(), "{:?}", report.mismatches);

    assert_eq!(services.catalog.get_book(a.id).await.unwrap().book.available_copies, 2);
    assert_eq!(services.catalog.get_shelf(left).await.unwrap().shelf.current_books, 1);
    assert_eq!(services.catalog.get_shelf(right).await.unwrap().shelf.current_books, 2);
}

#[tokio::test]
async fn cancelled_event_rejects_registration_changes() {
    let (services, repository) = services();
    let guest = account(&repository, Role::Guest).await;
    let student = account(&repository, Role::Student).await;
    let event = services.events.create_event(event_for(guest.user_id, 5)).await.unwrap();
    services.events.register(student, event.id).await.unwrap();

    let cancelled = services
        .events
        .change_status(event.id, EventStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, EventStatus::Cancelled);
    assert!(matches!(
        services.events.register(account(&repository, Role::Student).await, event.id).await,
        Err(AppError::EventNotOpen)
    ));
    assert!(matches!(
        services.events.change_status(event.id, EventStatus::Completed).await,
        Err(AppError::InvalidStateTransition(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_borrowers_share_the_copies() {
    let (services, repository) = services();
    let shelf_id = shelf(&services, "C1", 10).await;
    let book_id = services.catalog.create_book(book(shelf_id, "isbn-c", 3)).await.unwrap().id;

    let mut handles = Vec::new();
    for _ in 0..24 {
        let services = services.clone();
        let actor = account(&repository, Role::Student).await;
        handles.push(tokio::spawn(async move {
            services.loans.create_loan(actor, borrow(book_id)).await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(e) => assert!(matches!(e, AppError::NotAvailable(_)), "unexpected {:?}", e),
        }
    }

    assert_eq!(granted, 3);
    assert_eq!(services.catalog.get_book(book_id).await.unwrap().book.available_copies, 0);
    assert!(services.maintenance.audit().await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_never_exceed_capacity() {
    let (services, repository) = services();
    let guest = account(&repository, Role::Guest).await;
    let event_id = services.events.create_event(event_for(guest.user_id, 5)).await.unwrap().id;

    let mut handles = Vec::new();
    for _ in 0..30 {
        let services = services.clone();
        let actor = account(&repository, Role::Student).await;
        handles.push(tokio::spawn(async move { services.events.register(actor, event_id).await }));
    }

    let mut seated = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => seated += 1,
            Err(e) => assert!(matches!(e, AppError::EventFull), "unexpected {:?}", e),
        }
    }

    assert_eq!(seated, 5);
    let admin = account(&repository, Role::Admin).await;
    let details = services.events.get_event(Some(admin), event_id).await.unwrap();
    assert_eq!(details.event.current_attendees, 5);
    assert_eq!(details.event.attendees.len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_of_one_slot_admit_one() {
    let (services, repository) = services();
    let room_id = room(&services).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let services = services.clone();
        let actor = account(&repository, Role::Student).await;
        handles.push(tokio::spawn(async move {
            services
                .study_rooms
                .create_reservation(actor, slot(room_id, "14:00", "15:00"))
                .await
        }));
    }

    let mut booked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(e) => assert!(matches!(e, AppError::SlotConflict), "unexpected {:?}", e),
        }
    }

    assert_eq!(booked, 1);
    let availability = services.study_rooms.available_slots(room_id, jan_10()).await.unwrap();
    assert_eq!(availability.booked_slots.len(), 1);
    assert_eq!(availability.available_slots.len(), 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_user_racing_for_two_rooms_gets_one() {
    let (services, repository) = services();
    let rooms = [room(&services).await, room(&services).await];
    let actor = account(&repository, Role::Student).await;

    let handles: Vec<_> = rooms
        .iter()
        .map(|room_id| {
            let services = services.clone();
            let request = slot(*room_id, "09:00", "10:00");
            tokio::spawn(async move { services.study_rooms.create_reservation(actor, request).await })
        })
        .collect();

    let mut booked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(e) => assert!(matches!(e, AppError::UserAlreadyBooked), "unexpected {:?}", e),
        }
    }
    assert_eq!(booked, 1);
    assert_eq!(
        services
            .study_rooms
            .list_user_reservations(actor.user_id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn return_racing_the_sweep_ends_returned() {
    let (services, repository) = services();
    let shelf_id = shelf(&services, "X1", 10).await;
    let book = services.catalog.create_book(book(shelf_id, "isbn-x", 1)).await.unwrap();
    let borrower = account(&repository, Role::Student).await;
    let loan = services.loans.create_loan(borrower, borrow(book.id)).await.unwrap();
    let (loan_id, later) = (loan.id, loan.due_date + Duration::days(2));

    let sweeper = {
        let services = services.clone();
        tokio::spawn(async move { services.loans.sweep_overdue(later).await })
    };
    let returner = {
        let services = services.clone();
        tokio::spawn(async move { services.loans.return_loan(borrower, loan_id).await })
    };
    sweeper.await.unwrap().unwrap();
    returner.await.unwrap().unwrap();

    let mine = services.loans.list_for_user(borrower.user_id).await.unwrap();
    assert_eq!(mine[0].loan.status, LoanStatus::Returned);
    assert_eq!(services.catalog.get_book(book.id).await.unwrap().book.available_copies, 1);
}
