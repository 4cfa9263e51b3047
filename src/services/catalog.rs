//! Catalog service: shelves and books, with shelf capacity accounting

use uuid::Uuid;
use validator::Validate;

use super::{lost_race, optional};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookDetails, CreateBook, SetCopies, UpdateBook},
        shelf::{CreateShelf, Shelf, ShelfDetails, UpdateShelf},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_shelves(&self) -> AppResult<Vec<Shelf>> {
        self.repository.shelves.list().await
    }

    /// Get a shelf with the books on it
    pub async fn get_shelf(&self, id: Uuid) -> AppResult<ShelfDetails> {
        let shelf = self.repository.shelves.get(id).await?;
        let books = self.repository.books.list_on_shelf(id).await?;
        Ok(ShelfDetails { shelf, books })
    }

    pub async fn create_shelf(&self, data: CreateShelf) -> AppResult<Shelf> {
        data.validate()?;
        let shelf = self.repository.shelves.create(&data).await?;
        tracing::info!(shelf_id = %shelf.id, "Created shelf {}", shelf.shelf_number);
        Ok(shelf)
    }

    pub async fn update_shelf(&self, id: Uuid, data: UpdateShelf) -> AppResult<Shelf> {
        data.validate()?;
        let current = self.repository.shelves.get(id).await?;
        if let Some(capacity) = data.capacity {
            if capacity < current.current_books {
                return Err(AppError::CapacityExceeded(format!(
                    "Shelf {} holds {} books, capacity cannot be lower",
                    current.shelf_number, current.current_books
                )));
            }
        }
        let shelf = self
            .repository
            .shelves
            .update(id, &data)
            .await
            .map_err(lost_race("update_shelf"))?;
        tracing::info!(shelf_id = %id, "Updated shelf");
        Ok(shelf)
    }

    /// Delete an empty shelf
    pub async fn delete_shelf(&self, id: Uuid) -> AppResult<()> {
        self.repository.shelves.delete(id).await?;
        tracing::info!(shelf_id = %id, "Deleted shelf");
        Ok(())
    }

    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    pub async fn get_book(&self, id: Uuid) -> AppResult<BookDetails> {
        let book = self.repository.books.get(id).await?;
        let shelf = optional(self.repository.shelves.get(book.shelf_id).await)?;
        Ok(BookDetails { book, shelf })
    }

    /// Create a book and assign it to its shelf
    pub async fn create_book(&self, data: CreateBook) -> AppResult<Book> {
        data.validate()?;

        let shelf = self.repository.shelves.get(data.shelf_id).await?;
        if !shelf.has_room() {
            return Err(AppError::CapacityExceeded(format!("Shelf {} is full", shelf.shelf_number)));
        }
        if self.repository.books.find_by_isbn(&data.isbn).await?.is_some() {
            return Err(AppError::Conflict(format!("Book with ISBN {} already exists", data.isbn)));
        }

        let book = self
            .repository
            .books
            .create_on_shelf(&data)
            .await
            .map_err(lost_race("create_book"))?;
        tracing::info!(book_id = %book.id, shelf_id = %book.shelf_id, "Created book '{}'", book.title);
        Ok(book)
    }

    pub async fn update_book(&self, id: Uuid, data: UpdateBook) -> AppResult<Book> {
        data.validate()?;
        let book = self.repository.books.update(id, &data).await?;
        tracing::info!(book_id = %id, "Updated book");
        Ok(book)
    }

    /// Change the owned copies without disturbing the loans in progress
    pub async fn set_copies(&self, id: Uuid, data: SetCopies) -> AppResult<Book> {
        data.validate()?;
        let current = self.repository.books.get(id).await?;
        if data.copies < current.copies_on_loan() {
            return Err(AppError::CapacityExceeded(format!(
                "{} copies of '{}' are on loan, cannot reduce to {}",
                current.copies_on_loan(),
                current.title,
                data.copies
            )));
        }
        let book = self
            .repository
            .books
            .set_copies(id, data.copies)
            .await
            .map_err(lost_race("set_copies"))?;
        tracing::info!(book_id = %id, copies = book.copies, available = book.available_copies, "Changed copies");
        Ok(book)
    }

    /// Move a book to another shelf. Both shelves change or neither does.
    pub async fn move_book(&self, id: Uuid, shelf_id: Uuid) -> AppResult<Book> {
        let book = self.repository.books.get(id).await?;
        if book.shelf_id == shelf_id {
            return Ok(book);
        }
        let target = self.repository.shelves.get(shelf_id).await?;
        if !target.has_room() {
            return Err(AppError::CapacityExceeded(format!("Shelf {} is full", target.shelf_number)));
        }

        let moved = self
            .repository
            .books
            .move_to_shelf(id, shelf_id)
            .await
            .map_err(lost_race("move_book"))?;
        tracing::info!(book_id = %id, from = %book.shelf_id, to = %shelf_id, "Moved book");
        Ok(moved)
    }

    /// Delete a book without outstanding loans
    pub async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = %id, "Deleted book");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shelf(number: &str, capacity: i32) -> CreateShelf {
        CreateShelf {
            shelf_number: number.into(),
            location: "Floor 2".into(),
            section: "History".into(),
            capacity: Some(capacity),
            description: None,
        }
    }

    fn book(shelf_id: Uuid, isbn: &str) -> CreateBook {
        CreateBook {
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            isbn: isbn.into(),
            published_year: 1965,
            genre: "Science fiction".into(),
            copies: None,
            shelf_id,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_full_shelf_rejects_new_book() {
        let catalog = CatalogService::new(Repository::in_memory());
        let s = catalog.create_shelf(shelf("A1", 1)).await.unwrap();
        catalog.create_book(book(s.id, "111")).await.unwrap();

        let err = catalog.create_book(book(s.id, "222")).await.unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_)));
        assert_eq!(catalog.get_shelf(s.id).await.unwrap().shelf.current_books, 1);
        assert_eq!(catalog.list_books().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_move_updates_both_shelves() {
        let catalog = CatalogService::new(Repository::in_memory());
        let a = catalog.create_shelf(shelf("A1", 5)).await.unwrap();
        let b = catalog.create_shelf(shelf("B1", 5)).await.unwrap();
        let created = catalog.create_book(book(a.id, "111")).await.unwrap();
        assert_eq!(created.copies, 1);
        assert_eq!(created.available_copies, 1);

        catalog.move_book(created.id, b.id).await.unwrap();
        assert_eq!(catalog.get_shelf(a.id).await.unwrap().shelf.current_books, 0);
        let details = catalog.get_shelf(b.id).await.unwrap();
        assert_eq!(details.shelf.current_books, 1);
        assert_eq!(details.books[0].id, created.id);
    }

    #[tokio::test]
    async fn test_shelf_with_books_cannot_be_deleted_or_shrunk() {
        let catalog = CatalogService::new(Repository::in_memory());
        let s = catalog.create_shelf(shelf("A1", 3)).await.unwrap();
        let b1 = catalog.create_book(book(s.id, "111")).await.unwrap();
        catalog.create_book(book(s.id, "222")).await.unwrap();

        assert!(matches!(catalog.delete_shelf(s.id).await, Err(AppError::NotEmpty(_))));
        let shrink = UpdateShelf {
            capacity: Some(1),
            ..UpdateShelf::default()
        };
        assert!(matches!(
            catalog.update_shelf(s.id, shrink).await,
            Err(AppError::CapacityExceeded(_))
        ));

        catalog.delete_book(b1.id).await.unwrap();
        assert_eq!(catalog.get_shelf(s.id).await.unwrap().shelf.current_books, 1);
    }

    #[tokio::test]
    async fn test_duplicate_isbn_conflicts() {
        let catalog = CatalogService::new(Repository::in_memory());
        let s = catalog.create_shelf(shelf("A1", 3)).await.unwrap();
        catalog.create_book(book(s.id, "111")).await.unwrap();
        let err = catalog.create_book(book(s.id, "111")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(catalog.get_shelf(s.id).await.unwrap().shelf.current_books, 1);
    }
}
