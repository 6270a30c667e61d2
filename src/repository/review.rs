use super::{LookupField, Record, ReviewRepository, parse_field, write_error};
use crate::db::{Book, FromRow, Review, ReviewDetails, User};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Transaction, params};
use std::str::FromStr;

/// Queryable review columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewField {
    /// Review ID.
    Id,
    /// Author ID.
    UserId,
    /// Book ID.
    BookId,
    /// Rating value.
    Rating,
}

const REVIEW_FIELDS: &[(&str, ReviewField)] = &[
    ("id", ReviewField::Id),
    ("user_id", ReviewField::UserId),
    ("book_id", ReviewField::BookId),
    ("rating", ReviewField::Rating),
];

impl FromStr for ReviewField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        parse_field("review", s, REVIEW_FIELDS)
    }
}

impl LookupField for ReviewField {
    fn column(self) -> &'static str {
        match self {
            ReviewField::Id => "id",
            ReviewField::UserId => "user_id",
            ReviewField::BookId => "book_id",
            ReviewField::Rating => "rating",
        }
    }

    fn is_unique(self) -> bool {
        matches!(self, ReviewField::Id)
    }
}

impl Record for Review {
    const TABLE: &'static str = "reviews";

    type Field = ReviewField;

    fn id(&self) -> &str {
        &self.id
    }

    fn insert(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute(
            "INSERT INTO reviews (id, user_id, book_id, rating, comment, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.id,
                self.user_id,
                self.book_id,
                self.rating,
                self.comment,
                self.created_at.timestamp_millis(),
                self.updated_at.timestamp_millis(),
            ],
        )
        .map_err(|e| write_error(e, format!("Review '{}'", self.id)))?;
        Ok(())
    }

    fn replace(&self, tx: &Transaction<'_>, updated_at: DateTime<Utc>) -> Result<usize> {
        tx.execute(
            "UPDATE reviews SET user_id = ?1, book_id = ?2, rating = ?3, comment = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                self.user_id,
                self.book_id,
                self.rating,
                self.comment,
                updated_at.timestamp_millis(),
                self.id,
            ],
        )
        .map_err(|e| write_error(e, format!("Review '{}'", self.id)))
    }
}

const DETAILS_SQL: &str = "
    SELECT r.id AS r_id, r.user_id AS r_user_id, r.book_id AS r_book_id,
           r.rating AS r_rating, r.comment AS r_comment,
           r.created_at AS r_created_at, r.updated_at AS r_updated_at,
           u.id AS u_id, u.username AS u_username, u.email AS u_email,
           u.password_hash AS u_password_hash, u.role AS u_role,
           u.created_at AS u_created_at, u.updated_at AS u_updated_at,
           b.id AS b_id, b.upc AS b_upc, b.title AS b_title, b.author AS b_author,
           b.img_link AS b_img_link, b.description AS b_description,
           b.category AS b_category,
           b.created_at AS b_created_at, b.updated_at AS b_updated_at
    FROM reviews r
    JOIN users u ON u.id = r.user_id
    JOIN books b ON b.id = r.book_id
    WHERE r.book_id = ?1
    ORDER BY r.created_at ASC, r.rowid ASC";

impl ReviewRepository {
    /// Reviews of a book, each joined with its author and the book.
    pub fn list_for_book_with_details(&self, book_id: &str) -> Result<Vec<ReviewDetails>> {
        self.database()
            .with_transaction(|tx| {
                let mut stmt = tx.prepare(DETAILS_SQL)?;
                let mut rows = stmt.query(params![book_id])?;
                let mut details = Vec::new();
                while let Some(row) = rows.next()? {
                    details.push(ReviewDetails {
                        review: Review::from_prefixed_row(row, "r_")?,
                        user: User::from_prefixed_row(row, "u_")?,
                        book: Book::from_prefixed_row(row, "b_")?,
                    });
                }
                Ok(details)
            })
            .inspect_err(|e| {
                tracing::error!(book_id, error = %e, "Failed to load review details");
            })
    }

    /// Mean rating of a book, `None` when it has no reviews.
    pub fn average_rating(&self, book_id: &str) -> Result<Option<f64>> {
        self.database().with_transaction(|tx| {
            Ok(tx.query_row(
                "SELECT AVG(rating) FROM reviews WHERE book_id = ?1",
                params![book_id],
                |row| row.get::<_, Option<f64>>(0),
            )?)
        })
    }
}
