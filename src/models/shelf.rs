//! Shelf model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::book::Book;

pub const DEFAULT_SHELF_CAPACITY: i32 = 50;

/// Shelf record. `current_books` always equals the number of books on it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Shelf {
    pub id: Uuid,
    pub shelf_number: String,
    pub location: String,
    pub section: String,
    pub capacity: i32,
    pub current_books: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Shelf {
    pub fn has_room(&self) -> bool {
        self.current_books < self.capacity
    }
}

/// Create shelf request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShelf {
    #[validate(length(min = 1))]
    pub shelf_number: String,
    #[validate(length(min = 1))]
    pub location: String,
    #[validate(length(min = 1))]
    pub section: String,
    /// Defaults to 50
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
    pub description: Option<String>,
}

/// Update shelf request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShelf {
    #[validate(length(min = 1))]
    pub shelf_number: Option<String>,
    #[validate(length(min = 1))]
    pub location: Option<String>,
    #[validate(length(min = 1))]
    pub section: Option<String>,
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
    pub description: Option<String>,
}

/// A shelf together with the books it holds
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShelfDetails {
    pub shelf: Shelf,
    pub books: Vec<Book>,
}
