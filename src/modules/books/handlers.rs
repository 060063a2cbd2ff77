use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bookstore_http::error::AppError;

use super::models::{Book, BookInput};
use super::store::{SharedStore, StoreError};

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => not_found(id),
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

fn not_found(id: impl std::fmt::Display) -> AppError {
    AppError::not_found(format!("book {} not found", id))
}

/// Path ids are unsigned decimal integers; anything else names no book.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_found(raw));
    }
    raw.parse().map_err(|_| not_found(raw))
}

async fn load(store: &SharedStore, id: i64) -> Result<Book, AppError> {
    store
        .get(id)
        .await?
        .ok_or_else(|| not_found(id))
}

/// Liveness probe for the books module
pub async fn health_check() -> &'static str {
    "books module is healthy"
}

/// `GET /books/`
pub async fn list_books(State(store): State<SharedStore>) -> Result<Json<Vec<Book>>, AppError> {
    let books = store.list().await?;
    tracing::debug!(count = books.len(), "listed books");
    Ok(Json(books))
}

/// `GET /books/{id}/`
pub async fn get_book(
    State(store): State<SharedStore>,
    Path(raw_id): Path<String>,
) -> Result<Json<Book>, AppError> {
    let id = parse_id(&raw_id)?;
    Ok(Json(load(&store, id).await?))
}

/// `POST /books/`
pub async fn create_book(
    State(store): State<SharedStore>,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let mut book = input.into_book();
    store.save(&mut book).await?;

    let url = book.url().unwrap_or_default();
    tracing::info!(book_id = ?book.id(), %url, "book created");

    Ok((StatusCode::CREATED, [(header::LOCATION, url)], Json(book)))
}

/// `PUT /books/{id}/`
pub async fn replace_book(
    State(store): State<SharedStore>,
    Path(raw_id): Path<String>,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&raw_id)?;
    let mut book = load(&store, id).await?;
    let Json(input) = payload?;

    input.apply_to(&mut book);
    store.save(&mut book).await?;

    tracing::info!(book_id = id, "book replaced");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_parse() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert_eq!(parse_id("9999999999").unwrap(), 9_999_999_999);
    }

    #[test]
    fn malformed_ids_are_not_found() {
        for raw in ["", "abc", "-1", "+5", "1.5", "99999999999999999999999"] {
            let err = parse_id(raw).unwrap_err();
            assert!(matches!(err, AppError::NotFound { .. }), "{raw}");
        }
    }

    #[test]
    fn not_found_messages_share_one_format() {
        let from_store = match AppError::from(StoreError::NotFound(12)) {
            AppError::NotFound { message, .. } => message,
            other => panic!("unexpected error: {other:?}"),
        };
        let from_path = match parse_id("twelve").unwrap_err() {
            AppError::NotFound { message, .. } => message,
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(from_store, "book 12 not found");
        assert_eq!(from_path, "book twelve not found");
    }

    #[test]
    fn store_errors_map_to_http_errors() {
        let not_found: AppError = StoreError::NotFound(3).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let corrupt: AppError = StoreError::CorruptPrice {
            id: 3,
            value: "x".to_string(),
        }
        .into();
        assert_eq!(corrupt.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
