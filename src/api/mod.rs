//! API handlers for the campus library REST endpoints

pub mod admin;
pub mod auth;
pub mod books;
pub mod events;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod room_reservations;
pub mod shelves;
pub mod study_rooms;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Like [`AuthenticatedUser`], but anonymous requests pass through as `None`.
/// A header that is present but invalid is still rejected.
pub struct OptionalUser(pub Option<UserClaims>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(OptionalUser(None));
        }
        let AuthenticatedUser(claims) = AuthenticatedUser::from_request_parts(parts, state).await?;
        Ok(OptionalUser(Some(claims)))
    }
}

/// Build the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Users
        .route("/users", post(users::create_user))
        .route("/users/guests", get(users::list_guests))
        .route("/users/guests/:id", put(users::update_guest_profile))
        // Shelves
        .route("/shelves", get(shelves::list_shelves).post(shelves::create_shelf))
        .route(
            "/shelves/:id",
            get(shelves::get_shelf)
                .put(shelves::update_shelf)
                .delete(shelves::delete_shelf),
        )
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        .route("/books/:id/shelf", put(books::move_book))
        .route("/books/:id/copies", put(books::set_copies))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route("/loans/mine", get(loans::my_loans))
        .route("/loans/sweep-overdue", post(loans::sweep_overdue))
        .route("/loans/:id", delete(loans::delete_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        // Study rooms
        .route(
            "/study-rooms",
            get(study_rooms::list_rooms).post(study_rooms::create_room),
        )
        .route(
            "/study-rooms/:id",
            get(study_rooms::get_room)
                .put(study_rooms::update_room)
                .delete(study_rooms::delete_room),
        )
        .route("/study-rooms/:id/slots/:date", get(study_rooms::available_slots))
        // Room reservations
        .route(
            "/room-reservations",
            get(room_reservations::list_reservations).post(room_reservations::create_reservation),
        )
        .route("/room-reservations/mine", get(room_reservations::my_reservations))
        .route("/room-reservations/:id", delete(room_reservations::delete_reservation))
        .route("/room-reservations/:id/cancel", post(room_reservations::cancel_reservation))
        .route("/room-reservations/:id/complete", post(room_reservations::complete_reservation))
        // Events
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/mine/registered", get(events::my_registered_events))
        .route("/events/mine/invitations", get(events::my_invitations))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/status", put(events::change_status))
        .route("/events/:id/guest", put(events::change_guest))
        .route("/events/:id/register", post(events::register))
        .route("/events/:id/unregister", post(events::unregister))
        .route("/events/:id/invitation", put(events::respond_to_invitation))
        // Maintenance
        .route("/admin/consistency", get(admin::audit_counters))
        .route("/admin/consistency/repair", post(admin::repair_counters))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
