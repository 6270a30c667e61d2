mod schema;

pub use schema::{DEFAULT_BUSY_TIMEOUT, Database};

pub(crate) use schema::map_write_error;

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::FromSql;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest accepted review rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted review rating.
pub const MAX_RATING: u8 = 5;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular reader.
    #[default]
    User,
    /// Administrator: may change roles and remove other accounts.
    Admin,
}

impl Role {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Validation(format!(
                "Role must be 'admin' or 'user', got '{}'",
                other
            ))),
        }
    }
}

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Unique book ID.
    pub id: String,
    /// Product code, unique across the catalog.
    pub upc: String,
    /// Title.
    pub title: String,
    /// Author name.
    pub author: String,
    /// Cover image reference.
    pub img_link: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Category label.
    pub category: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// New book with a fresh ID and timestamps.
    pub fn new(upc: impl Into<String>, title: impl Into<String>, author: impl Into<String>) -> Self {
        let now = now_utc();
        Self {
            id: new_id(),
            upc: upc.into(),
            title: title.into(),
            author: author.into(),
            img_link: None,
            description: None,
            category: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the category label.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the cover image reference.
    pub fn with_img_link(mut self, img_link: impl Into<String>) -> Self {
        self.img_link = Some(img_link.into());
        self
    }
}

/// User account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Login name, unique.
    pub username: String,
    /// Email address, unique.
    pub email: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Account role.
    pub role: Role,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New account with a fresh ID and timestamps. `password_hash` must already be hashed.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        let now = now_utc();
        Self {
            id: new_id(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A user's rating and comment on a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Unique review ID.
    pub id: String,
    /// Author of the review.
    pub user_id: String,
    /// Reviewed book.
    pub book_id: String,
    /// Rating, 1 to 5.
    pub rating: u8,
    /// Free-text comment.
    pub comment: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// New review with a fresh ID and timestamps.
    pub fn new(
        user_id: impl Into<String>,
        book_id: impl Into<String>,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Self> {
        validate_rating(rating)?;
        let now = now_utc();
        Ok(Self {
            id: new_id(),
            user_id: user_id.into(),
            book_id: book_id.into(),
            rating,
            comment: comment.into(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Review joined with its author and book for display.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewDetails {
    /// The stored review.
    pub review: Review,
    /// Review author.
    pub user: User,
    /// Reviewed book.
    pub book: Book,
}

/// Reject ratings outside `MIN_RATING..=MAX_RATING`.
pub fn validate_rating(rating: u8) -> Result<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::Validation(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

/// Generate an entity ID.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time at the precision timestamps are stored with (milliseconds).
pub fn now_utc() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Convert a stored millisecond timestamp to DateTime.
pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Explicit mapping from a name-keyed row to an entity.
///
/// Columns are looked up as `{prefix}{name}` so joined queries can alias
/// each side of the join.
pub trait FromRow: Sized {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Build the entity from prefixed columns.
    fn from_prefixed_row(row: &Row<'_>, prefix: &str) -> Result<Self>;

    /// Build the entity from unprefixed columns.
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Self::from_prefixed_row(row, "")
    }
}

fn column<T: FromSql>(row: &Row<'_>, entity: &str, prefix: &str, name: &str) -> Result<T> {
    let key = format!("{}{}", prefix, name);
    row.get(key.as_str())
        .map_err(|e| AppError::MalformedRow(format!("{}.{}: {}", entity, name, e)))
}

fn timestamp_column(
    row: &Row<'_>,
    entity: &str,
    prefix: &str,
    name: &str,
) -> Result<DateTime<Utc>> {
    let ms: i64 = column(row, entity, prefix, name)?;
    millis_to_datetime(ms).ok_or_else(|| {
        AppError::MalformedRow(format!("{}.{}: timestamp out of range: {}", entity, name, ms))
    })
}

impl FromRow for Book {
    const ENTITY: &'static str = "book";

    fn from_prefixed_row(row: &Row<'_>, prefix: &str) -> Result<Self> {
        let e = Self::ENTITY;
        Ok(Book {
            id: column(row, e, prefix, "id")?,
            upc: column(row, e, prefix, "upc")?,
            title: column(row, e, prefix, "title")?,
            author: column(row, e, prefix, "author")?,
            img_link: column(row, e, prefix, "img_link")?,
            description: column(row, e, prefix, "description")?,
            category: column(row, e, prefix, "category")?,
            created_at: timestamp_column(row, e, prefix, "created_at")?,
            updated_at: timestamp_column(row, e, prefix, "updated_at")?,
        })
    }
}

impl FromRow for User {
    const ENTITY: &'static str = "user";

    fn from_prefixed_row(row: &Row<'_>, prefix: &str) -> Result<Self> {
        let e = Self::ENTITY;
        let role: String = column(row, e, prefix, "role")?;
        Ok(User {
            id: column(row, e, prefix, "id")?,
            username: column(row, e, prefix, "username")?,
            email: column(row, e, prefix, "email")?,
            password_hash: column(row, e, prefix, "password_hash")?,
            role: role
                .parse()
                .map_err(|_| AppError::MalformedRow(format!("user.role: unknown role '{}'", role)))?,
            created_at: timestamp_column(row, e, prefix, "created_at")?,
            updated_at: timestamp_column(row, e, prefix, "updated_at")?,
        })
    }
}

impl FromRow for Review {
    const ENTITY: &'static str = "review";

    fn from_prefixed_row(row: &Row<'_>, prefix: &str) -> Result<Self> {
        let e = Self::ENTITY;
        let rating: i64 = column(row, e, prefix, "rating")?;
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| validate_rating(*r).is_ok())
            .ok_or_else(|| {
                AppError::MalformedRow(format!("review.rating: out of range: {}", rating))
            })?;
        Ok(Review {
            id: column(row, e, prefix, "id")?,
            user_id: column(row, e, prefix, "user_id")?,
            book_id: column(row, e, prefix, "book_id")?,
            rating,
            comment: column(row, e, prefix, "comment")?,
            created_at: timestamp_column(row, e, prefix, "created_at")?,
            updated_at: timestamp_column(row, e, prefix, "updated_at")?,
        })
    }
}
