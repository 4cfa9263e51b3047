//! Shelf endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::shelf::{CreateShelf, Shelf, ShelfDetails, UpdateShelf},
};

use super::AuthenticatedUser;

/// List shelves
#[utoipa::path(
    get,
    path = "/shelves",
    tag = "catalog",
    responses(
        (status = 200, description = "All shelves", body = Vec<Shelf>)
    )
)]
pub async fn list_shelves(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Shelf>>> {
    let shelves = state.services.catalog.list_shelves().await?;
    Ok(Json(shelves))
}

/// Get a shelf with its books
#[utoipa::path(
    get,
    path = "/shelves/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Shelf ID")),
    responses(
        (status = 200, description = "Shelf details", body = ShelfDetails),
        (status = 404, description = "Shelf not found")
    )
)]
pub async fn get_shelf(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ShelfDetails>> {
    let shelf = state.services.catalog.get_shelf(id).await?;
    Ok(Json(shelf))
}

/// Create a shelf
#[utoipa::path(
    post,
    path = "/shelves",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = CreateShelf,
    responses(
        (status = 201, description = "Shelf created", body = Shelf),
        (status = 409, description = "Shelf number already used")
    )
)]
pub async fn create_shelf(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateShelf>,
) -> AppResult<(StatusCode, Json<Shelf>)> {
    claims.require_admin()?;

    let shelf = state.services.catalog.create_shelf(data).await?;
    Ok((StatusCode::CREATED, Json(shelf)))
}

/// Update a shelf
#[utoipa::path(
    put,
    path = "/shelves/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Shelf ID")),
    request_body = UpdateShelf,
    responses(
        (status = 200, description = "Shelf updated", body = Shelf),
        (status = 404, description = "Shelf not found"),
        (status = 422, description = "Capacity below the books on the shelf")
    )
)]
pub async fn update_shelf(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateShelf>,
) -> AppResult<Json<Shelf>> {
    claims.require_admin()?;

    let shelf = state.services.catalog.update_shelf(id, data).await?;
    Ok(Json(shelf))
}

/// Delete an empty shelf
#[utoipa::path(
    delete,
    path = "/shelves/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Shelf ID")),
    responses(
        (status = 204, description = "Shelf deleted"),
        (status = 404, description = "Shelf not found"),
        (status = 409, description = "Shelf still holds books")
    )
)]
pub async fn delete_shelf(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.catalog.delete_shelf(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
