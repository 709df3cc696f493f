pub mod models;
pub mod repository;
pub mod routes;
pub mod validation;

use async_trait::async_trait;
use axum::Router;
use bookstore_kernel::{InitCtx, Migration, Module};

use repository::BookRepository;

/// Book catalogue module: CRUD over the `books` table
pub struct BooksModule {
    repository: BookRepository,
}

impl BooksModule {
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }
}

/// Schema for the `books` table
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_create_books",
        up: r#"
            CREATE TABLE books (
                isbn       TEXT PRIMARY KEY,
                amazon_url TEXT NOT NULL,
                author     TEXT NOT NULL,
                language   TEXT NOT NULL,
                pages      INTEGER NOT NULL,
                publisher  TEXT NOT NULL,
                title      TEXT NOT NULL,
                year       INTEGER NOT NULL
            );
            "#,
    }]
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.repository.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
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

fn error_response(description: &str) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": { "schema": schema }
        }
    })
}

fn isbn_parameter() -> serde_json::Value {
    serde_json::json!({
        "name": "isbn",
        "in": "path",
        "required": true,
        "schema": { "type": "string" }
    })
}

fn request_body(schema: &str) -> serde_json::Value {
    serde_json::json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": format!("#/components/schemas/{schema}") }
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let book_envelope = serde_json::json!({
        "type": "object",
        "properties": { "book": { "$ref": "#/components/schemas/Book" } },
        "required": ["book"]
    });
    let string = serde_json::json!({ "type": "string" });
    let integer = serde_json::json!({ "type": "integer" });
    let mut book_properties = serde_json::json!({
        "isbn": string,
        "amazon_url": string,
        "author": string,
        "language": string,
        "pages": { "type": "integer", "minimum": 1 },
        "publisher": string,
        "title": string,
        "year": { "type": "integer", "minimum": 1000, "maximum": 9999 }
    });
    let all_fields = [
        "isbn",
        "amazon_url",
        "author",
        "language",
        "pages",
        "publisher",
        "title",
        "year",
    ];

    let book = serde_json::json!({
        "type": "object",
        "properties": book_properties.clone(),
        "required": all_fields
    });
    if let Some(properties) = book_properties.as_object_mut() {
        properties.remove("isbn");
    }
    let update_book = serde_json::json!({
        "type": "object",
        "properties": book_properties.clone(),
        "required": &all_fields[1..]
    });
    let partial_update_book = serde_json::json!({
        "type": "object",
        "properties": book_properties
    });

    serde_json::json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "description": "Query-string pairs are exact-match filters on book columns",
                    "tags": ["Books"],
                    "parameters": [
                        { "name": "author", "in": "query", "schema": string },
                        { "name": "year", "in": "query", "schema": integer }
                    ],
                    "responses": {
                        "200": json_response("List of books", serde_json::json!({
                            "type": "object",
                            "properties": {
                                "books": {
                                    "type": "array",
                                    "items": { "$ref": "#/components/schemas/Book" }
                                }
                            }
                        })),
                        "400": error_response("Invalid filter")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": request_body("Book"),
                    "responses": {
                        "201": json_response("Created book", book_envelope.clone()),
                        "400": error_response("Validation error"),
                        "409": error_response("Duplicate isbn")
                    }
                }
            },
            "/{isbn}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [isbn_parameter()],
                    "responses": {
                        "200": json_response("Book", book_envelope.clone()),
                        "404": error_response("Book not found")
                    }
                },
                "put": {
                    "summary": "Replace every field of a book",
                    "tags": ["Books"],
                    "parameters": [isbn_parameter()],
                    "requestBody": request_body("UpdateBook"),
                    "responses": {
                        "200": json_response("Updated book", book_envelope.clone()),
                        "400": error_response("Validation error"),
                        "404": error_response("Book not found")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [isbn_parameter()],
                    "responses": {
                        "200": json_response("Deletion confirmation", serde_json::json!({
                            "type": "object",
                            "properties": { "message": string }
                        })),
                        "404": error_response("Book not found")
                    }
                }
            },
            "/partial_update/{isbn}": {
                "put": {
                    "summary": "Update the supplied fields of a book",
                    "tags": ["Books"],
                    "parameters": [isbn_parameter()],
                    "requestBody": request_body("PartialUpdateBook"),
                    "responses": {
                        "200": json_response("Updated book", book_envelope),
                        "400": error_response("Validation error"),
                        "404": error_response("Book not found")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": book,
                "UpdateBook": update_book,
                "PartialUpdateBook": partial_update_book
            }
        }
    })
}

/// Create a new instance of the books module
pub fn create_module(repository: BookRepository) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new(repository))
}
