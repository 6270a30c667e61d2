//! book-reviews: book catalog and review storage with user accounts.
//!
//! This crate provides the data-access and authentication core of a
//! book-review site. Presentation (routes, templates, uploads) lives
//! elsewhere and calls into it.
//!
//! # Features
//!
//! - SQLite persistence with one transaction per repository call
//! - Book, user and review repositories with allow-listed field lookups
//! - Paginated listings
//! - Argon2 password hashing
//! - Login by username or email with explicit session objects
//! - Signed, time-limited password reset links

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database gateway and entity types.
pub mod db;
/// Error types.
pub mod error;
/// Outgoing email.
pub mod mail;
/// Pagination arithmetic.
pub mod pagination;
/// Entity repositories.
pub mod repository;

#[cfg(test)]
mod tests;

pub use auth::{AuthService, SessionContext, SessionIdentity};
pub use config::{Cli, Command, Config};
pub use db::{Book, Database, Review, Role, User};
pub use error::{AppError, Result};
pub use pagination::PaginationInfo;
pub use repository::{BookRepository, Lookup, Page, ReviewRepository, UserRepository};
