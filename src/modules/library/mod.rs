pub mod handlers;
pub mod models;
pub mod render;
pub mod service;

use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use serde_json::json;
use stacks_kernel::{InitCtx, Migration, Module};

/// Library module: the book listing and the borrow/return desk
pub struct LibraryModule;

impl LibraryModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for LibraryModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for LibraryModule {
    fn name(&self) -> &'static str {
        "library"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let books = service::list_books(ctx.db).await?;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            books = books.len(),
            "library module initialized"
        );
        Ok(())
    }

    fn mount_path(&self) -> String {
        "/".to_string()
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        Router::new()
            .route(handlers::HOME, get(handlers::home))
            .route("/books", get(handlers::list_books))
            .route("/books/{id}/borrow", post(handlers::borrow_book))
            .route("/books/{id}/return", post(handlers::return_book))
            .route("/books/{id}/transactions", get(handlers::book_transactions))
            .route("/health", get(handlers::health_check))
            .with_state(ctx.db.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error_response = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let book_id = json!({
            "name": "id",
            "in": "path",
            "required": true,
            "schema": { "type": "integer", "format": "int32" }
        });
        let redirect = json!({
            "description": "Redirect to the listing page; a flash cookie carries the notification",
            "headers": {
                "Location": { "schema": { "type": "string" } },
                "Set-Cookie": { "schema": { "type": "string" } }
            }
        });

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Book listing page",
                        "tags": ["Library"],
                        "responses": {
                            "200": {
                                "description": "HTML list of all books",
                                "content": { "text/html": { "schema": { "type": "string" } } }
                            },
                            "500": error_response("Internal server error")
                        }
                    }
                },
                "/books": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Library"],
                        "responses": {
                            "200": {
                                "description": "All books in id order",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Book" }
                                        }
                                    }
                                }
                            },
                            "500": error_response("Internal server error")
                        }
                    }
                },
                "/books/{id}/borrow": {
                    "post": {
                        "summary": "Borrow a book",
                        "tags": ["Library"],
                        "parameters": [book_id.clone()],
                        "responses": {
                            "303": redirect.clone(),
                            "404": error_response("Book not found")
                        }
                    }
                },
                "/books/{id}/return": {
                    "post": {
                        "summary": "Return a book",
                        "tags": ["Library"],
                        "parameters": [book_id.clone()],
                        "responses": {
                            "303": redirect,
                            "404": error_response("Book not found")
                        }
                    }
                },
                "/books/{id}/transactions": {
                    "get": {
                        "summary": "Transaction history of a book",
                        "tags": ["Library"],
                        "parameters": [book_id],
                        "responses": {
                            "200": {
                                "description": "Transactions, oldest first",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Transaction" }
                                        }
                                    }
                                }
                            },
                            "404": error_response("Book not found")
                        }
                    }
                },
                "/health": {
                    "get": {
                        "summary": "Library health check",
                        "tags": ["Library"],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": { "text/plain": { "schema": { "type": "string" } } }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "format": "int32" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "genre": { "type": "string" },
                            "description": { "type": "string" },
                            "published": { "type": "string", "format": "date-time" },
                            "in_stock": {
                                "type": "boolean",
                                "description": "true while the book is available for borrowing"
                            }
                        },
                        "required": ["id", "title", "author", "genre", "description", "published", "in_stock"]
                    },
                    "Transaction": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "format": "int32" },
                            "datetime": { "type": "string", "format": "date-time" },
                            "action": { "type": "string", "enum": ["CHECKOUT", "CHECKIN"] },
                            "book_id": { "type": "integer", "format": "int32" }
                        },
                        "required": ["id", "datetime", "action", "book_id"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE books (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    title       TEXT NOT NULL,
                    author      TEXT NOT NULL,
                    genre       TEXT NOT NULL,
                    description TEXT NOT NULL,
                    published   TEXT NOT NULL,
                    in_stock    BOOLEAN NOT NULL
                );
                CREATE TABLE transactions (
                    id       INTEGER PRIMARY KEY AUTOINCREMENT,
                    datetime TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    action   TEXT NOT NULL CHECK (action IN ('CHECKOUT', 'CHECKIN')),
                    book_id  INTEGER NOT NULL REFERENCES books (id) ON DELETE RESTRICT
                );
                CREATE INDEX transactions_book_id ON transactions (book_id);
                "#,
        }]
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "library module stopped");
        Ok(())
    }
}

/// Create a new instance of the library module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(LibraryModule::new())
}
