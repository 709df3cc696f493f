//! Single-statement persistence for books.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::models::{Book, BookChanges, BookFields, BookFilter, ColumnValue, NewBook};

const BOOK_COLUMNS: &str = "isbn, amazon_url, author, language, pages, publisher, title, year";

#[derive(Debug, thiserror::Error)]
pub enum BookError {
    #[error("There is no book with an isbn of '{0}'")]
    NotFound(String),

    #[error("A book with an isbn of '{0}' already exists")]
    Conflict(String),

    #[error("database failure: {0}")]
    Database(#[from] sqlx::Error),
}

pub type BookResult<T> = Result<T, BookError>;

/// Repository over the `books` table. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct BookRepository {
    pool: SqlitePool,
}

impl BookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All books matching every filter condition, ordered by title.
    pub async fn find_all(&self, filter: &BookFilter) -> BookResult<Vec<Book>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {BOOK_COLUMNS} FROM books"));

        for (index, (column, value)) in filter.conditions.iter().enumerate() {
            query.push(if index == 0 { " WHERE " } else { " AND " });
            query.push(*column).push(" = ");
            push_value(&mut query, value.clone());
        }
        query.push(" ORDER BY title, isbn");

        let books = query.build_query_as::<Book>().fetch_all(&self.pool).await?;
        Ok(books)
    }

    pub async fn find_one(&self, isbn: &str) -> BookResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE isbn = ?"
        ))
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| BookError::NotFound(isbn.to_string()))
    }

    /// Insert a book. The isbn primary key turns duplicates into `Conflict`.
    pub async fn create(&self, book: &NewBook) -> BookResult<Book> {
        let created = sqlx::query_as::<_, Book>(&format!(
            "INSERT INTO books ({BOOK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&book.isbn)
        .bind(&book.amazon_url)
        .bind(&book.author)
        .bind(&book.language)
        .bind(book.pages)
        .bind(&book.publisher)
        .bind(&book.title)
        .bind(book.year)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            let duplicate = matches!(
                &err,
                sqlx::Error::Database(db_err) if db_err.is_unique_violation()
            );
            if duplicate {
                BookError::Conflict(book.isbn.clone())
            } else {
                BookError::Database(err)
            }
        })?;

        tracing::info!(isbn = %created.isbn, "book created");
        Ok(created)
    }

    /// Replace every non-isbn field.
    pub async fn update(&self, isbn: &str, fields: BookFields) -> BookResult<Book> {
        self.write_columns(isbn, fields.into()).await
    }

    /// Replace only the supplied fields.
    pub async fn update_part(&self, isbn: &str, changes: BookChanges) -> BookResult<Book> {
        self.write_columns(isbn, changes).await
    }

    pub async fn remove(&self, isbn: &str) -> BookResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE isbn = ?")
            .bind(isbn)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BookError::NotFound(isbn.to_string()));
        }

        tracing::info!(%isbn, "book deleted");
        Ok(())
    }

    /// Shared write path for full and partial updates.
    ///
    /// Column names come from `BookChanges::assignments`, never from input; an
    /// empty change set reads the current row instead of writing.
    async fn write_columns(&self, isbn: &str, changes: BookChanges) -> BookResult<Book> {
        let assignments = changes.assignments();
        if assignments.is_empty() {
            return self.find_one(isbn).await;
        }

        let columns: Vec<&str> = assignments.iter().map(|(column, _)| *column).collect();

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE books SET ");
        for (index, (column, value)) in assignments.into_iter().enumerate() {
            if index > 0 {
                query.push(", ");
            }
            query.push(column).push(" = ");
            push_value(&mut query, value);
        }
        query.push(" WHERE isbn = ").push_bind(isbn.to_string());
        query.push(format!(" RETURNING {BOOK_COLUMNS}"));

        let updated = query
            .build_query_as::<Book>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| BookError::NotFound(isbn.to_string()))?;

        tracing::info!(%isbn, ?columns, "book updated");
        Ok(updated)
    }
}

fn push_value(query: &mut QueryBuilder<'_, Sqlite>, value: ColumnValue) {
    match value {
        ColumnValue::Text(text) => query.push_bind(text),
        ColumnValue::Integer(number) => query.push_bind(number),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books;
    use bookstore_db::Database;

    async fn repository() -> (Database, BookRepository) {
        let db = Database::in_memory().await.unwrap();
        let migrations: Vec<_> = books::migrations()
            .into_iter()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        db.run_migrations(&migrations).await.unwrap();
        let repository = BookRepository::new(db.pool().clone());
        (db, repository)
    }

    fn new_book(isbn: &str) -> NewBook {
        NewBook {
            isbn: isbn.to_string(),
            amazon_url: "http://a.co/eobPtX2".to_string(),
            author: "Matthew Lane".to_string(),
            language: "english".to_string(),
            pages: 264,
            publisher: "Princeton University Press".to_string(),
            title: "Power-up: Unlocking the Hidden Mathematics in Video Games".to_string(),
            year: 2017,
        }
    }

    async fn count(repository: &BookRepository) -> usize {
        repository
            .find_all(&BookFilter::default())
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn find_all_on_empty_table_is_empty() {
        let (_db, repository) = repository().await;
        assert!(repository
            .find_all(&BookFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn created_book_can_be_fetched() {
        let (_db, repository) = repository().await;
        let created = repository.create(&new_book("0691161518")).await.unwrap();

        assert_eq!(created.isbn, "0691161518");
        assert_eq!(repository.find_one("0691161518").await.unwrap(), created);
    }

    #[tokio::test]
    async fn duplicate_isbn_conflicts_without_touching_existing_row() {
        let (_db, repository) = repository().await;
        let original = repository.create(&new_book("0691161518")).await.unwrap();

        let mut duplicate = new_book("0691161518");
        duplicate.title = "Another title".to_string();
        let err = repository.create(&duplicate).await.unwrap_err();

        assert!(matches!(err, BookError::Conflict(ref isbn) if isbn == "0691161518"));
        assert_eq!(repository.find_one("0691161518").await.unwrap(), original);
        assert_eq!(count(&repository).await, 1);
    }

    #[tokio::test]
    async fn find_one_unknown_isbn_is_not_found() {
        let (_db, repository) = repository().await;
        let err = repository.find_one("1").await.unwrap_err();
        assert!(matches!(err, BookError::NotFound(ref isbn) if isbn == "1"));
    }

    #[tokio::test]
    async fn find_all_applies_exact_match_filters() {
        let (_db, repository) = repository().await;
        repository.create(&new_book("1111111111")).await.unwrap();
        let mut other = new_book("2222222222");
        other.author = "Someone Else".to_string();
        other.year = 2001;
        repository.create(&other).await.unwrap();

        let filter = BookFilter {
            conditions: vec![
                ("author", ColumnValue::Text("Someone Else".to_string())),
                ("year", ColumnValue::Integer(2001)),
            ],
        };
        let books = repository.find_all(&filter).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].isbn, "2222222222");

        let filter = BookFilter {
            conditions: vec![("year", ColumnValue::Integer(1999))],
        };
        assert!(repository.find_all(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_update_replaces_non_key_fields() {
        let (_db, repository) = repository().await;
        let original = repository.create(&new_book("0691161518")).await.unwrap();

        let fields = BookFields {
            amazon_url: original.amazon_url.clone(),
            author: original.author.clone(),
            language: original.language.clone(),
            pages: original.pages,
            publisher: original.publisher.clone(),
            title: original.title.clone(),
            year: 2018,
        };
        let updated = repository.update("0691161518", fields).await.unwrap();

        assert_eq!(updated, Book { year: 2018, ..original });
        assert_eq!(repository.find_one("0691161518").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn partial_update_changes_only_supplied_fields() {
        let (_db, repository) = repository().await;
        let original = repository.create(&new_book("0691161518")).await.unwrap();

        let changes = BookChanges {
            author: Some("X".to_string()),
            ..BookChanges::default()
        };
        let updated = repository.update_part("0691161518", changes).await.unwrap();

        assert_eq!(
            updated,
            Book {
                author: "X".to_string(),
                ..original
            }
        );
    }

    #[tokio::test]
    async fn empty_partial_update_returns_book_unchanged() {
        let (_db, repository) = repository().await;
        let original = repository.create(&new_book("0691161518")).await.unwrap();

        let updated = repository
            .update_part("0691161518", BookChanges::default())
            .await
            .unwrap();
        assert_eq!(updated, original);

        let err = repository
            .update_part("1", BookChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BookError::NotFound(_)));
    }

    #[tokio::test]
    async fn writes_to_unknown_isbn_are_not_found() {
        let (_db, repository) = repository().await;
        repository.create(&new_book("0691161518")).await.unwrap();

        let changes = BookChanges {
            title: Some("Nope".to_string()),
            ..BookChanges::default()
        };
        assert!(matches!(
            repository.update_part("1", changes).await.unwrap_err(),
            BookError::NotFound(_)
        ));
        assert!(matches!(
            repository.remove("1").await.unwrap_err(),
            BookError::NotFound(_)
        ));
        assert_eq!(count(&repository).await, 1);
    }

    #[tokio::test]
    async fn remove_deletes_exactly_one_row() {
        let (_db, repository) = repository().await;
        repository.create(&new_book("1111111111")).await.unwrap();
        repository.create(&new_book("2222222222")).await.unwrap();

        repository.remove("1111111111").await.unwrap();

        let remaining = repository.find_all(&BookFilter::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].isbn, "2222222222");
    }
}
