//! Persistence for books: a trait plus SQLite and in-memory backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tokio::sync::RwLock;

use super::models::{Book, Price};

pub type SharedStore = Arc<dyn BookStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("book {0} not found")]
    NotFound(i64),

    #[error("stored price '{value}' of book {id} is not a decimal")]
    CorruptPrice { id: i64, value: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Storage seam for the books module.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// All books in insertion order.
    async fn list(&self) -> Result<Vec<Book>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Book>, StoreError>;

    /// Insert an unsaved book (assigning its id) or update a saved one.
    ///
    /// Updating a book whose row no longer exists is [`StoreError::NotFound`].
    async fn save(&self, book: &mut Book) -> Result<(), StoreError>;
}

pub struct SqliteBookStore {
    pool: SqlitePool,
}

impl SqliteBookStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn book_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Book, StoreError> {
        let id: i64 = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let raw_price: String = row.try_get("price")?;
        let price: Price = raw_price
            .parse()
            .map_err(|_| StoreError::CorruptPrice {
                id,
                value: raw_price.clone(),
            })?;
        Ok(Book::with_id(id, name, price))
    }
}

#[async_trait]
impl BookStore for SqliteBookStore {
    async fn list(&self) -> Result<Vec<Book>, StoreError> {
        let rows = sqlx::query("SELECT id, name, price FROM books ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::book_from_row).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Book>, StoreError> {
        let row = sqlx::query("SELECT id, name, price FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::book_from_row).transpose()
    }

    async fn save(&self, book: &mut Book) -> Result<(), StoreError> {
        let price = book.price.to_string();

        match book.id() {
            None => {
                let result = sqlx::query("INSERT INTO books (name, price) VALUES (?, ?)")
                    .bind(&book.name)
                    .bind(&price)
                    .execute(&self.pool)
                    .await?;
                book.assign_id(result.last_insert_rowid());
            }
            Some(id) => {
                let result = sqlx::query("UPDATE books SET name = ?, price = ? WHERE id = ?")
                    .bind(&book.name)
                    .bind(&price)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound(id));
                }
            }
        }

        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    last_id: i64,
    books: BTreeMap<i64, Book>,
}

/// Process-local store; ids start at 1 and are never reused.
#[derive(Default)]
pub struct MemoryBookStore {
    state: RwLock<MemoryState>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn list(&self) -> Result<Vec<Book>, StoreError> {
        Ok(self.state.read().await.books.values().cloned().collect())
    }

    async fn get(&self, id: i64) -> Result<Option<Book>, StoreError> {
        Ok(self.state.read().await.books.get(&id).cloned())
    }

    async fn save(&self, book: &mut Book) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        match book.id() {
            None => {
                state.last_id += 1;
                let id = state.last_id;
                book.assign_id(id);
                state.books.insert(id, book.clone());
            }
            Some(id) => match state.books.get_mut(&id) {
                Some(stored) => *stored = book.clone(),
                None => return Err(StoreError::NotFound(id)),
            },
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::BooksModule;
    use bookstore_kernel::Module;

    fn price(s: &str) -> Price {
        s.parse().unwrap()
    }

    async fn sqlite_store() -> SqliteBookStore {
        let pool = bookstore_db::connect_in_memory().await.unwrap();
        let migrations: Vec<(String, bookstore_kernel::Migration)> = BooksModule::schema()
            .into_iter()
            .map(|m| ("books".to_string(), m))
            .collect();
        bookstore_db::run_migrations(&pool, &migrations)
            .await
            .unwrap();
        SqliteBookStore::new(pool)
    }

    async fn exercise_store(store: &dyn BookStore) {
        let mut django = Book::new("Django Book", price("29.90"));
        let mut python = Book::new("Python Cookbook", price("39.9"));
        assert_eq!(django.url(), None);

        store.save(&mut django).await.unwrap();
        store.save(&mut python).await.unwrap();

        let django_id = django.id().unwrap();
        assert_eq!(django.url(), Some(format!("/books/{}/", django_id)));
        assert!(python.id().unwrap() > django_id);

        assert_eq!(store.list().await.unwrap(), vec![django.clone(), python.clone()]);

        let fetched = store.get(django_id).await.unwrap().unwrap();
        assert_eq!(fetched, django);
        assert_eq!(fetched.price.to_string(), "29.90");
        assert_eq!(store.get(9_999_999_999).await.unwrap(), None);

        django.name = "Kochbuch".to_string();
        django.price = price("9.90");
        store.save(&mut django).await.unwrap();
        assert_eq!(django.id(), Some(django_id));

        let updated = store.get(django_id).await.unwrap().unwrap();
        assert_eq!(updated.name, "Kochbuch");
        assert_eq!(updated.price.to_string(), "9.90");
        assert_eq!(updated.url(), django.url());
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        exercise_store(&MemoryBookStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_store_round_trip() {
        exercise_store(&sqlite_store().await).await;
    }

    #[tokio::test]
    async fn updating_missing_book_is_not_found() {
        let stores: Vec<Box<dyn BookStore>> = vec![
            Box::new(MemoryBookStore::new()),
            Box::new(sqlite_store().await),
        ];

        for store in stores {
            let mut ghost = Book::with_id(77, "Ghost".to_string(), price("1.00"));
            let err = store.save(&mut ghost).await.unwrap_err();
            assert!(matches!(err, StoreError::NotFound(77)));
        }
    }

    #[tokio::test]
    async fn sqlite_rejects_corrupt_price() {
        let store = sqlite_store().await;
        sqlx::query("INSERT INTO books (name, price) VALUES ('Broken', 'n/a')")
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store.list().await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptPrice { ref value, .. } if value == "n/a"));
    }

    #[test]
    fn books_module_declares_schema() {
        let module = BooksModule::new(Arc::new(MemoryBookStore::new()));
        assert_eq!(module.migrations().len(), BooksModule::schema().len());
    }
}
