//! Book model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::shelf::Shelf;

/// Book record.
///
/// `copies - available_copies` equals the number of outstanding loans of the
/// book; callers never write `available_copies` directly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_year: i32,
    pub genre: String,
    pub copies: i32,
    pub available_copies: i32,
    pub shelf_id: Uuid,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Book {
    pub fn copies_on_loan(&self) -> i32 {
        self.copies - self.available_copies
    }
}

/// Book with its shelf, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetails {
    pub book: Book,
    pub shelf: Option<Shelf>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub author: String,
    #[validate(length(min = 1))]
    pub isbn: String,
    pub published_year: i32,
    #[validate(length(min = 1))]
    pub genre: String,
    /// Defaults to 1
    #[validate(range(min = 1))]
    pub copies: Option<i32>,
    pub shelf_id: Uuid,
    pub description: Option<String>,
}

/// Update of descriptive book fields
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub author: Option<String>,
    #[validate(length(min = 1))]
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    #[validate(length(min = 1))]
    pub genre: Option<String>,
    pub description: Option<String>,
}

/// Move a book to another shelf
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveBook {
    pub shelf_id: Uuid,
}

/// Change the number of copies owned
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SetCopies {
    #[validate(range(min = 1))]
    pub copies: i32,
}
