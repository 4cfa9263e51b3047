//! Account administration endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::user::{CreateUser, UpdateGuestProfile, User},
};

use super::AuthenticatedUser;

/// Create an account with any role
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Administrator privileges required"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    claims.require_admin()?;

    let user = state.services.users.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// List guest speakers
#[utoipa::path(
    get,
    path = "/users/guests",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Guest accounts", body = Vec<User>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_guests(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<User>>> {
    claims.require_admin()?;

    let guests = state.services.users.list_guests().await?;
    Ok(Json(guests))
}

/// Update a guest's speaker profile
#[utoipa::path(
    put,
    path = "/users/guests/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Guest user ID")),
    request_body = UpdateGuestProfile,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Account is not a guest"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_guest_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(profile): Json<UpdateGuestProfile>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;

    let guest = state.services.users.update_guest_profile(id, profile).await?;
    Ok(Json(guest))
}
