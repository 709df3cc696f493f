//! HTTP handlers for `/books`.

use std::collections::HashMap;

use axum::{
    body::HttpBody,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use bookstore_http::error::AppError;
use serde::Serialize;
use serde_json::{Map, Value};

use super::models::Book;
use super::repository::{BookError, BookRepository};
use super::validation;

#[derive(Debug, Serialize)]
pub struct BookList {
    pub books: Vec<Book>,
}

#[derive(Debug, Serialize)]
pub struct BookEnvelope {
    pub book: Book,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::NotFound(_) => AppError::not_found(err.to_string()),
            BookError::Conflict(_) => AppError::conflict(err.to_string()),
            BookError::Database(db_err) => AppError::Internal(db_err.into()),
        }
    }
}

/// Routes relative to the module mount point.
pub fn router(repository: BookRepository) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route(
            "/{isbn}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/partial_update/{isbn}", put(partial_update_book))
        .with_state(repository)
}

/// Unwrap a JSON body, reporting malformed input in the error envelope.
///
/// Only `application/json` is accepted. Form-encoded writes are not supported
/// and fail here with the missing content type message.
fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// GET / => {books: [book, ...]}
async fn list_books(
    State(repository): State<BookRepository>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<BookList>, AppError> {
    let filter = validation::filter_from_query(&query).map_err(AppError::validation)?;
    let books = repository.find_all(&filter).await?;
    Ok(Json(BookList { books }))
}

/// GET /{isbn} => {book: book}
async fn get_book(
    State(repository): State<BookRepository>,
    Path(isbn): Path<String>,
) -> Result<Json<BookEnvelope>, AppError> {
    let book = repository.find_one(&isbn).await?;
    Ok(Json(BookEnvelope { book }))
}

/// POST / bookData => 201 {book: newBook}
async fn create_book(
    State(repository): State<BookRepository>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<BookEnvelope>), AppError> {
    let new_book = validation::validate_create(json_body(payload)?).map_err(AppError::validation)?;
    let book = repository.create(&new_book).await?;
    Ok((StatusCode::CREATED, Json(BookEnvelope { book })))
}

/// PUT /{isbn} bookData => {book: updatedBook}
async fn update_book(
    State(repository): State<BookRepository>,
    Path(isbn): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BookEnvelope>, AppError> {
    let fields =
        validation::validate_full_update(json_body(payload)?).map_err(AppError::validation)?;
    let book = repository.update(&isbn, fields).await?;
    Ok(Json(BookEnvelope { book }))
}

/// PUT /partial_update/{isbn} partialData => {book: updatedBook}
async fn partial_update_book(
    State(repository): State<BookRepository>,
    Path(isbn): Path<String>,
    request: Request,
) -> Result<Json<BookEnvelope>, AppError> {
    // A request without a body changes nothing, like an empty object
    let payload = if request.body().is_end_stream() {
        Value::Object(Map::new())
    } else {
        json_body(Json::<Value>::from_request(request, &()).await)?
    };

    let changes = validation::validate_partial_update(payload).map_err(AppError::validation)?;
    let book = repository.update_part(&isbn, changes).await?;
    Ok(Json(BookEnvelope { book }))
}

/// DELETE /{isbn} => {message: "Book deleted"}
async fn delete_book(
    State(repository): State<BookRepository>,
    Path(isbn): Path<String>,
) -> Result<Json<Message>, AppError> {
    repository.remove(&isbn).await?;
    Ok(Json(Message {
        message: "Book deleted",
    }))
}
