pub mod handlers;
pub mod models;
pub mod store;

use async_trait::async_trait;
use axum::{routing::get, Router};
use bookstore_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use store::SharedStore;

/// The book resource service
pub struct BooksModule {
    store: SharedStore,
}

impl BooksModule {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// DDL backing [`store::SqliteBookStore`]
    pub fn schema() -> Vec<Migration> {
        vec![Migration {
            id: "001_create_books",
            up: r#"
                CREATE TABLE IF NOT EXISTS books (
                    id    INTEGER PRIMARY KEY AUTOINCREMENT,
                    name  TEXT NOT NULL,
                    price TEXT NOT NULL
                );
                "#,
        }]
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let count = self.store.list().await?.len();
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            books = count,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route(
                "/books/",
                get(handlers::list_books).post(handlers::create_book),
            )
            .route(
                "/books/{id}/",
                get(handlers::get_book).put(handlers::replace_book),
            )
            .route("/books/health", get(handlers::health_check))
            .with_state(self.store.clone())
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
        let book_body = json!({
            "required": true,
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/BookInput" }
                }
            }
        });
        let id_param = json!([{
            "name": "id",
            "in": "path",
            "required": true,
            "schema": { "type": "integer", "format": "int64" }
        }]);

        Some(json!({
            "paths": {
                "/books/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "All books in creation order",
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
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "requestBody": book_body.clone(),
                        "responses": {
                            "201": {
                                "description": "Created book",
                                "headers": {
                                    "Location": {
                                        "description": "URL of the new book",
                                        "schema": { "type": "string" }
                                    }
                                },
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": error_response("Malformed JSON body"),
                            "422": error_response("Validation error")
                        }
                    }
                },
                "/books/{id}/": {
                    "get": {
                        "summary": "Get a book",
                        "tags": ["Books"],
                        "parameters": id_param.clone(),
                        "responses": {
                            "200": {
                                "description": "The book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "404": error_response("Book not found")
                        }
                    },
                    "put": {
                        "summary": "Replace a book",
                        "tags": ["Books"],
                        "parameters": id_param,
                        "requestBody": book_body,
                        "responses": {
                            "204": { "description": "Book replaced" },
                            "400": error_response("Malformed JSON body"),
                            "404": error_response("Book not found"),
                            "422": error_response("Validation error")
                        }
                    }
                },
                "/books/health": {
                    "get": {
                        "summary": "Books health check",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": {
                                    "text/plain": { "schema": { "type": "string" } }
                                }
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
                            "id": {
                                "type": "integer",
                                "format": "int64",
                                "description": "Identifier assigned on creation"
                            },
                            "name": {
                                "type": "string",
                                "description": "Title of the book"
                            },
                            "price": {
                                "type": "string",
                                "example": "29.90",
                                "description": "Price with exactly two decimal places"
                            },
                            "url": {
                                "type": "string",
                                "example": "/books/1/",
                                "description": "Resource path of the book"
                            }
                        },
                        "required": ["id", "name", "price", "url"]
                    },
                    "BookInput": {
                        "type": "object",
                        "properties": {
                            "name": {
                                "type": "string",
                                "description": "Title of the book"
                            },
                            "price": {
                                "type": "string",
                                "example": "9.90",
                                "description": "Decimal price, rounded to two places"
                            }
                        },
                        "required": ["name", "price"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        Self::schema()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module(store: SharedStore) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new(store))
}
