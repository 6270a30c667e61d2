use super::{LookupField, Record, UserRepository, parse_field, write_error};
use crate::db::User;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Transaction, params};
use std::str::FromStr;

/// Queryable user columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    /// User ID.
    Id,
    /// Login name.
    Username,
    /// Email address.
    Email,
    /// Account role.
    Role,
}

const USER_FIELDS: &[(&str, UserField)] = &[
    ("id", UserField::Id),
    ("username", UserField::Username),
    ("email", UserField::Email),
    ("role", UserField::Role),
];

impl FromStr for UserField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        parse_field("user", s, USER_FIELDS)
    }
}

impl LookupField for UserField {
    fn column(self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Username => "username",
            UserField::Email => "email",
            UserField::Role => "role",
        }
    }

    fn is_unique(self) -> bool {
        !matches!(self, UserField::Role)
    }
}

impl Record for User {
    const TABLE: &'static str = "users";

    type Field = UserField;

    fn id(&self) -> &str {
        &self.id
    }

    fn insert(&self, tx: &Transaction<'_>) -> Result<()> {
        tx.execute(
            "INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.id,
                self.username,
                self.email,
                self.password_hash,
                self.role.as_str(),
                self.created_at.timestamp_millis(),
                self.updated_at.timestamp_millis(),
            ],
        )
        .map_err(|e| write_error(e, format!("User '{}' or email '{}'", self.username, self.email)))?;
        Ok(())
    }

    fn replace(&self, tx: &Transaction<'_>, updated_at: DateTime<Utc>) -> Result<usize> {
        tx.execute(
            "UPDATE users SET username = ?1, email = ?2, password_hash = ?3, role = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                self.username,
                self.email,
                self.password_hash,
                self.role.as_str(),
                updated_at.timestamp_millis(),
                self.id,
            ],
        )
        .map_err(|e| write_error(e, format!("User '{}' or email '{}'", self.username, self.email)))
    }
}

impl UserRepository {
    /// Find a user by email.
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find_by(UserField::Email, email)?.into_vec().into_iter().next())
    }

    /// Find a user by username.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .find_by(UserField::Username, username)?
            .into_vec()
            .into_iter()
            .next())
    }
}
