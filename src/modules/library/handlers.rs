use axum::{
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    response::{Html, Redirect},
    Json,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use stacks_http::{
    error::AppError,
    flash::{Flash, IncomingFlash, Notification},
};

use super::models::{book, transaction};
use super::render;
use super::service::{self, LendingError, Outcome};

/// Path of the `home` listing page
pub const HOME: &str = "/";

impl From<LendingError> for AppError {
    fn from(err: LendingError) -> Self {
        let message = err.to_string();
        match err {
            LendingError::NotFound(_) => AppError::not_found(message),
            LendingError::Protected {
                book_id,
                transactions,
            } => AppError::conflict(
                vec![json!({ "book_id": book_id, "transactions": transactions })],
                message,
            ),
            LendingError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

/// Book id taken from the path. An id that is not a 32-bit integer can name
/// no book, so it is reported as not found rather than as a bad request.
pub struct BookId(pub i32);

impl<S> FromRequestParts<S> for BookId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::Internal(anyhow::Error::msg(e.body_text())))?;

        raw.parse()
            .map(BookId)
            .map_err(|_| AppError::not_found(format!("book {raw} not found")))
    }
}

fn notification_for(outcome: &Outcome) -> Notification {
    if outcome.is_completed() {
        Notification::success(outcome.message())
    } else {
        Notification::error(outcome.message())
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "library module is healthy"
}

/// `home`: every book with its availability, plus any pending notifications
pub async fn home(
    State(db): State<DatabaseConnection>,
    flash: IncomingFlash,
) -> Result<(Flash, Html<String>), AppError> {
    let books = service::list_books(&db).await?;
    let (notifications, flash) = flash.take();

    Ok((flash, Html(render::book_list(&books, &notifications))))
}

/// `borrow_book`
pub async fn borrow_book(
    State(db): State<DatabaseConnection>,
    BookId(id): BookId,
    flash: IncomingFlash,
) -> Result<(Flash, Redirect), AppError> {
    let outcome = service::borrow_book(&db, id).await?;

    Ok((flash.keep().push(notification_for(&outcome)), Redirect::to(HOME)))
}

/// `return_book`
pub async fn return_book(
    State(db): State<DatabaseConnection>,
    BookId(id): BookId,
    flash: IncomingFlash,
) -> Result<(Flash, Redirect), AppError> {
    let outcome = service::return_book(&db, id).await?;

    Ok((flash.keep().push(notification_for(&outcome)), Redirect::to(HOME)))
}

/// JSON rendition of the listing
pub async fn list_books(
    State(db): State<DatabaseConnection>,
) -> Result<Json<Vec<book::Model>>, AppError> {
    Ok(Json(service::list_books(&db).await?))
}

/// A book's transaction history, oldest first
pub async fn book_transactions(
    State(db): State<DatabaseConnection>,
    BookId(id): BookId,
) -> Result<Json<Vec<transaction::Model>>, AppError> {
    Ok(Json(service::transactions_for(&db, id).await?))
}
