use super::{BookRepository, LookupField, Record, parse_field, write_error};
use crate::db::Book;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Transaction, params};
use std::str::FromStr;

/// Queryable book columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookField {
    /// Book ID.
    Id,
    /// Product code.
    Upc,
    /// Title.
    Title,
    /// Category label.
    Category,
    /// Author name.
    Author,
}

const BOOK_FIELDS: &[(&str, BookField)] = &[
    ("id", BookField::Id),
    ("upc", BookField::Upc),
    ("title", BookField::Title),
    ("category", BookField::Category),
    ("author", BookField::Author),
];

impl FromStr for BookField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        parse_field("book", s, BOOK_FIELDS)
    }
}

impl LookupField for BookField {
    fn column(self) -> &'static str {
        match self {
            BookField::Id => "id",
            BookField::Upc => "upc",
            BookField::Title => "title",
            BookField::Category => "category",
            BookField::Author => "author",
        }
    }

    fn is_unique(self) -> bool {
        matches!(self, BookField::Id | BookField::Upc)
    }
}

impl Record for Book {
    const TABLE: &'static str = "books";

    type Field = BookField;

    fn id(&self) -> &str {
        &self.id
    }

    fn insert(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute(
            "INSERT INTO books (id, upc, title, author, img_link, description, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.id,
                self.upc,
                self.title,
                self.author,
                self.img_link,
                self.description,
                self.category,
                self.created_at.timestamp_millis(),
                self.updated_at.timestamp_millis(),
            ],
        )
        .map_err(|e| write_error(e, format!("Book with UPC '{}'", self.upc)))?;
        Ok(())
    }

    fn replace(&self, tx: &Transaction<'_>, updated_at: DateTime<Utc>) -> Result<usize> {
        tx.execute(
            "UPDATE books SET upc = ?1, title = ?2, author = ?3, img_link = ?4,
                    description = ?5, category = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                self.upc,
                self.title,
                self.author,
                self.img_link,
                self.description,
                self.category,
                updated_at.timestamp_millis(),
                self.id,
            ],
        )
        .map_err(|e| write_error(e, format!("Book with UPC '{}'", self.upc)))
    }
}

impl BookRepository {
    /// Distinct non-empty category labels, sorted.
    pub fn list_distinct_categories(&self) -> Result<Vec<String>> {
        self.database()
            .with_transaction(|tx| {
                let mut stmt = tx.prepare(
                    "SELECT DISTINCT category FROM books
                     WHERE category IS NOT NULL AND category <> ''
                     ORDER BY category",
                )?;
                let categories = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(categories)
            })
            .inspect_err(|e| tracing::error!(error = %e, "Failed to list book categories"))
    }

    /// Whether a book already uses `upc`.
    pub fn upc_exists(&self, upc: &str) -> Result<bool> {
        Ok(!self.find_by(BookField::Upc, upc)?.is_empty())
    }
}
