//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, auth, books, events, health, loans, room_reservations, shelves, study_rooms, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campus Library API",
        version = "0.3.0",
        description = "Campus library REST API: catalog, loans, study rooms and guest events",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        // Users
        users::create_user,
        users::list_guests,
        users::update_guest_profile,
        // Catalog
        shelves::list_shelves,
        shelves::get_shelf,
        shelves::create_shelf,
        shelves::update_shelf,
        shelves::delete_shelf,
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::move_book,
        books::set_copies,
        books::delete_book,
        // Loans
        loans::list_loans,
        loans::my_loans,
        loans::create_loan,
        loans::return_loan,
        loans::delete_loan,
        loans::sweep_overdue,
        // Study rooms
        study_rooms::list_rooms,
        study_rooms::get_room,
        study_rooms::available_slots,
        study_rooms::create_room,
        study_rooms::update_room,
        study_rooms::delete_room,
        room_reservations::list_reservations,
        room_reservations::my_reservations,
        room_reservations::create_reservation,
        room_reservations::cancel_reservation,
        room_reservations::complete_reservation,
        room_reservations::delete_reservation,
        // Events
        events::list_events,
        events::get_event,
        events::my_registered_events,
        events::my_invitations,
        events::create_event,
        events::update_event,
        events::change_status,
        events::change_guest,
        events::register,
        events::unregister,
        events::respond_to_invitation,
        events::delete_event,
        // Maintenance
        admin::audit_counters,
        admin::repair_counters,
    ),
    components(
        schemas(
            // Auth & users
            auth::LoginResponse,
            crate::models::user::User,
            crate::models::user::Role,
            crate::models::user::RegisterUser,
            crate::models::user::CreateUser,
            crate::models::user::LoginRequest,
            crate::models::user::UpdateGuestProfile,
            // Catalog
            crate::models::shelf::Shelf,
            crate::models::shelf::ShelfDetails,
            crate::models::shelf::CreateShelf,
            crate::models::shelf::UpdateShelf,
            crate::models::book::Book,
            crate::models::book::BookDetails,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::MoveBook,
            crate::models::book::SetCopies,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanDetails,
            crate::models::loan::CreateLoan,
            // Study rooms
            crate::models::study_room::StudyRoom,
            crate::models::study_room::CreateStudyRoom,
            crate::models::study_room::UpdateStudyRoom,
            crate::models::study_room::RoomReservation,
            crate::models::study_room::RoomReservationStatus,
            crate::models::study_room::CreateRoomReservation,
            crate::models::study_room::RoomAvailability,
            crate::models::time::TimeRange,
            // Events
            crate::models::event::Event,
            crate::models::event::EventStatus,
            crate::models::event::EventDetails,
            crate::models::event::InvitationStatus,
            crate::models::event::InvitationResponse,
            crate::models::event::CreateEvent,
            crate::models::event::UpdateEvent,
            crate::models::event::UpdateEventStatus,
            crate::models::event::ChangeEventGuest,
            crate::models::event::RespondInvitation,
            // Maintenance
            crate::models::maintenance::ConsistencyReport,
            crate::models::maintenance::CounterMismatch,
            crate::models::maintenance::SweepResult,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
            crate::error::ErrorKind,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "Account administration"),
        (name = "catalog", description = "Shelves and books"),
        (name = "loans", description = "Book loans"),
        (name = "study-rooms", description = "Study rooms and reservations"),
        (name = "events", description = "Guest events and invitations"),
        (name = "admin", description = "Counter audit and repair")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
