use serde::{Deserialize, Serialize};

/// A book as stored in the `books` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    /// Natural key, immutable once created
    pub isbn: String,
    pub amazon_url: String,
    pub author: String,
    pub language: String,
    pub pages: i64,
    pub publisher: String,
    pub title: String,
    /// Four-digit publication year
    pub year: i64,
}

/// Payload for creating a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub isbn: String,
    pub amazon_url: String,
    pub author: String,
    pub language: String,
    pub pages: i64,
    pub publisher: String,
    pub title: String,
    pub year: i64,
}

/// Payload for a full update: every field except the isbn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFields {
    pub amazon_url: String,
    pub author: String,
    pub language: String,
    pub pages: i64,
    pub publisher: String,
    pub title: String,
    pub year: i64,
}

/// Payload for a partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookChanges {
    pub amazon_url: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i64>,
    pub publisher: Option<String>,
    pub title: Option<String>,
    pub year: Option<i64>,
}

/// A value bound into a dynamically built statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Text(String),
    Integer(i64),
}

impl BookChanges {
    /// Columns to write, in table order.
    pub fn assignments(self) -> Vec<(&'static str, ColumnValue)> {
        let text = |column, value: Option<String>| value.map(|v| (column, ColumnValue::Text(v)));
        let integer =
            |column, value: Option<i64>| value.map(|v| (column, ColumnValue::Integer(v)));

        [
            text("amazon_url", self.amazon_url),
            text("author", self.author),
            text("language", self.language),
            integer("pages", self.pages),
            text("publisher", self.publisher),
            text("title", self.title),
            integer("year", self.year),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

impl From<BookFields> for BookChanges {
    fn from(fields: BookFields) -> Self {
        Self {
            amazon_url: Some(fields.amazon_url),
            author: Some(fields.author),
            language: Some(fields.language),
            pages: Some(fields.pages),
            publisher: Some(fields.publisher),
            title: Some(fields.title),
            year: Some(fields.year),
        }
    }
}

/// Exact-match column filters for listing books.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub conditions: Vec<(&'static str, ColumnValue)>,
}
