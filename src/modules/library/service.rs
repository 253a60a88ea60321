//! Lending logic - the store operations behind the library handlers

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::*;
use thiserror::Error;

use super::models::book::{self, Availability};
use super::models::transaction::{self, Action};
use super::models::{Book, Transaction};

/// Error type for lending operations
#[derive(Debug, Error)]
pub enum LendingError {
    #[error("book {0} not found")]
    NotFound(i32),

    #[error("book {book_id} is referenced by {transactions} transaction(s) and cannot be deleted")]
    Protected { book_id: i32, transactions: u64 },

    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Direction a book moves across the desk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Movement {
    Borrow,
    Return,
}

impl Movement {
    pub fn action(self) -> Action {
        match self {
            Movement::Borrow => Action::Checkout,
            Movement::Return => Action::Checkin,
        }
    }

    /// State the book has to be in for the move to apply, and the state it ends in
    fn transition(self) -> (Availability, Availability) {
        match self {
            Movement::Borrow => (Availability::Available, Availability::Borrowed),
            Movement::Return => (Availability::Borrowed, Availability::Available),
        }
    }

    fn success_message(self, book: &book::Model) -> String {
        match self {
            Movement::Borrow => format!("Borrowed {} by {}", book.title, book.author),
            Movement::Return => format!("Returned {} by {}", book.title, book.author),
        }
    }

    fn conflict_message(self, book: &book::Model) -> String {
        match self {
            Movement::Borrow => format!("{} by {} is unavailable", book.title, book.author),
            Movement::Return => format!("{} by {} is already here", book.title, book.author),
        }
    }
}

/// Result of a borrow or return request against an existing book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub movement: Movement,
    /// The book as it stands after the request
    pub book: book::Model,
    /// The recorded transaction; `None` when the book was already in the target state
    pub transaction: Option<transaction::Model>,
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        self.transaction.is_some()
    }

    /// User-facing text describing the outcome
    pub fn message(&self) -> String {
        if self.is_completed() {
            self.movement.success_message(&self.book)
        } else {
            self.movement.conflict_message(&self.book)
        }
    }
}

/// Fields for a book entered out of band
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub published: DateTime<Utc>,
    pub in_stock: bool,
}

/// List all books in id order
pub async fn list_books<C: ConnectionTrait>(db: &C) -> Result<Vec<book::Model>, LendingError> {
    let books = Book::find().order_by_asc(book::Column::Id).all(db).await?;
    Ok(books)
}

/// Load one book
pub async fn find_book<C: ConnectionTrait>(db: &C, id: i32) -> Result<book::Model, LendingError> {
    Book::find_by_id(id)
        .one(db)
        .await?
        .ok_or(LendingError::NotFound(id))
}

/// Check a book out
pub async fn borrow_book(db: &DatabaseConnection, id: i32) -> Result<Outcome, LendingError> {
    move_book(db, id, Movement::Borrow).await
}

/// Check a book back in
pub async fn return_book(db: &DatabaseConnection, id: i32) -> Result<Outcome, LendingError> {
    move_book(db, id, Movement::Return).await
}

/// Flip and log in one database transaction.
///
/// The guarded `UPDATE` is the first statement so the transaction takes
/// SQLite's write lock before it reads anything; a concurrent request waits
/// on the busy timeout, then matches no row and reports the conflict.
async fn move_book(
    db: &DatabaseConnection,
    id: i32,
    movement: Movement,
) -> Result<Outcome, LendingError> {
    let (from, to) = movement.transition();
    let txn = db.begin().await?;

    let updated = Book::update_many()
        .col_expr(book::Column::InStock, Expr::value(to.in_stock()))
        .filter(book::Column::Id.eq(id))
        .filter(book::Column::InStock.eq(from.in_stock()))
        .exec(&txn)
        .await?;

    if updated.rows_affected == 0 {
        txn.rollback().await?;

        let book = find_book(db, id).await?;
        tracing::info!(
            book_id = id,
            ?movement,
            state = ?book.availability(),
            "book not in a state to move"
        );
        return Ok(Outcome {
            movement,
            book,
            transaction: None,
        });
    }

    let record = transaction::ActiveModel {
        datetime: Set(Utc::now()),
        action: Set(movement.action()),
        book_id: Set(id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let book = find_book(&txn, id).await?;

    txn.commit().await?;

    tracing::info!(
        book_id = id,
        transaction_id = record.id,
        action = ?record.action,
        "book moved"
    );

    Ok(Outcome {
        movement,
        book,
        transaction: Some(record),
    })
}

/// Transactions recorded for a book, oldest first
pub async fn transactions_for(
    db: &DatabaseConnection,
    book_id: i32,
) -> Result<Vec<transaction::Model>, LendingError> {
    find_book(db, book_id).await?;

    let records = Transaction::find()
        .filter(transaction::Column::BookId.eq(book_id))
        .order_by_asc(transaction::Column::Datetime)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await?;

    Ok(records)
}

/// Insert a book into the catalog
pub async fn create_book(
    db: &DatabaseConnection,
    new_book: NewBook,
) -> Result<book::Model, LendingError> {
    let model = book::ActiveModel {
        title: Set(new_book.title),
        author: Set(new_book.author),
        genre: Set(new_book.genre),
        description: Set(new_book.description),
        published: Set(new_book.published),
        in_stock: Set(new_book.in_stock),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(book_id = model.id, title = %model.title, "book added to catalog");
    Ok(model)
}

/// Delete a book that no transaction refers to
pub async fn delete_book(db: &DatabaseConnection, id: i32) -> Result<(), LendingError> {
    let history = Query::select()
        .column(transaction::Column::BookId)
        .from(Transaction)
        .to_owned();

    let deleted = Book::delete_many()
        .filter(book::Column::Id.eq(id))
        .filter(book::Column::Id.not_in_subquery(history))
        .exec(db)
        .await?;

    if deleted.rows_affected == 0 {
        find_book(db, id).await?;
        let transactions = Transaction::find()
            .filter(transaction::Column::BookId.eq(id))
            .count(db)
            .await?;
        return Err(LendingError::Protected {
            book_id: id,
            transactions,
        });
    }

    tracing::info!(book_id = id, "book removed from catalog");
    Ok(())
}
