//! Entity repositories: allow-listed lookups, paginated listing and CRUD.
//!
//! Column names in generated SQL only ever come from the static field enums
//! below. Caller-supplied field names are parsed into those enums first and
//! rejected with [`AppError::DisallowedField`] when unknown.

mod book;
mod review;
mod user;

pub use book::BookField;
pub use review::ReviewField;
pub use user::UserField;

use crate::db::{Book, Database, FromRow, Review, User, map_write_error, now_utc};
use crate::error::{AppError, Result};
use crate::pagination::PaginationInfo;
use chrono::{DateTime, Utc};
use rusqlite::{ToSql, Transaction, params};
use serde::Serialize;
use std::marker::PhantomData;
use std::str::FromStr;

/// Repository over the `books` table.
pub type BookRepository = Repository<Book>;
/// Repository over the `users` table.
pub type UserRepository = Repository<User>;
/// Repository over the `reviews` table.
pub type ReviewRepository = Repository<Review>;

/// A queryable column of an entity.
pub trait LookupField: FromStr<Err = AppError> + Copy + std::fmt::Debug {
    /// Column name. Always a static identifier.
    fn column(self) -> &'static str;

    /// Whether at most one row can match.
    fn is_unique(self) -> bool;
}

/// An entity stored in its own table.
pub trait Record: FromRow {
    /// Table name.
    const TABLE: &'static str;

    /// Allow-listed lookup fields.
    type Field: LookupField;

    /// Row ID.
    fn id(&self) -> &str;

    /// Insert this entity.
    fn insert(&self, tx: &Transaction<'_>) -> Result<()>;

    /// Replace the row with this entity's image. Returns affected rows.
    fn replace(&self, tx: &Transaction<'_>, updated_at: DateTime<Utc>) -> Result<usize>;
}

/// Result of a field lookup.
///
/// Unique fields yield `One`, all others yield `Many`.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Lookup on a unique field.
    One(Option<T>),
    /// Lookup on a non-unique field, in creation order.
    Many(Vec<T>),
}

impl<T> Lookup<T> {
    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        match self {
            Lookup::One(item) => item.is_none(),
            Lookup::Many(items) => items.is_empty(),
        }
    }

    /// Flatten into a list regardless of cardinality.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Lookup::One(item) => item.into_iter().collect(),
            Lookup::Many(items) => items,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items on this page, oldest first.
    pub items: Vec<T>,
    /// Position of this page.
    pub pagination: PaginationInfo,
}

/// Repository for one entity type.
#[derive(Clone)]
pub struct Repository<T> {
    db: Database,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Record> Repository<T> {
    /// Create a repository on the given database.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    /// Underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// List one page of entities, oldest first.
    pub fn list_paginated(&self, page: u32, per_page: u32) -> Result<Page<T>> {
        if page == 0 || per_page == 0 {
            return Err(AppError::Validation(
                "page and per_page must be positive".to_string(),
            ));
        }

        let pagination = PaginationInfo::new(page, per_page, 0);
        let offset = i64::try_from(pagination.offset())
            .map_err(|_| AppError::Validation("page is out of range".to_string()))?;

        let result = self.db.with_transaction(|tx| {
            let total: i64 =
                tx.query_row(&format!("SELECT COUNT(*) FROM {}", T::TABLE), [], |r| {
                    r.get(0)
                })?;
            let sql = format!(
                "SELECT * FROM {} ORDER BY created_at ASC, rowid ASC LIMIT ?1 OFFSET ?2",
                T::TABLE
            );
            let items = query_all::<T>(tx, &sql, params![per_page, offset])?;
            Ok((total, items))
        });

        match result {
            Ok((total, items)) => Ok(Page {
                items,
                pagination: PaginationInfo::new(page, per_page, u64::try_from(total).unwrap_or(0)),
            }),
            Err(e) => {
                tracing::error!(table = T::TABLE, page, per_page, error = %e, "Paginated listing failed");
                Err(e)
            }
        }
    }

    /// Count all rows.
    pub fn count(&self) -> Result<u64> {
        let total: i64 = self.db.with_transaction(|tx| {
            Ok(tx.query_row(&format!("SELECT COUNT(*) FROM {}", T::TABLE), [], |r| {
                r.get(0)
            })?)
        })?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// Look up by a field name given as text.
    ///
    /// Names outside the entity's allow-list fail with
    /// [`AppError::DisallowedField`] before any query runs.
    pub fn get_by_field(&self, field: &str, value: &str) -> Result<Lookup<T>> {
        let field = field.parse::<T::Field>()?;
        self.find_by(field, value)
    }

    /// Look up by a typed field.
    pub fn find_by(&self, field: T::Field, value: &str) -> Result<Lookup<T>> {
        tracing::debug!(table = T::TABLE, field = ?field, "Lookup");

        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 ORDER BY created_at ASC, rowid ASC",
            T::TABLE,
            field.column()
        );

        self.db
            .with_transaction(|tx| {
                if field.is_unique() {
                    Ok(Lookup::One(query_all::<T>(tx, &sql, params![value])?.into_iter().next()))
                } else {
                    Ok(Lookup::Many(query_all::<T>(tx, &sql, params![value])?))
                }
            })
            .inspect_err(|e| {
                tracing::error!(table = T::TABLE, field = ?field, error = %e, "Lookup failed");
            })
    }

    /// Get an entity by ID.
    pub fn get(&self, id: &str) -> Result<Option<T>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1", T::TABLE);
        self.db
            .with_transaction(|tx| Ok(query_all::<T>(tx, &sql, params![id])?.into_iter().next()))
    }

    /// Insert a new entity.
    ///
    /// Duplicate business keys fail with [`AppError::Conflict`].
    pub fn create(&self, entity: &T) -> Result<()> {
        self.db
            .with_transaction(|tx| entity.insert(tx))
            .inspect(|_| tracing::info!(table = T::TABLE, id = entity.id(), "Created"))
            .inspect_err(|e| {
                tracing::error!(table = T::TABLE, id = entity.id(), error = %e, "Create failed");
            })
    }

    /// Replace the stored row with `entity`, refreshing `updated_at`.
    ///
    /// Returns `false` when no row has that ID.
    pub fn update(&self, entity: &T) -> Result<bool> {
        let updated_at = now_utc();
        let rows = self
            .db
            .with_transaction(|tx| entity.replace(tx, updated_at))
            .inspect_err(|e| {
                tracing::error!(table = T::TABLE, id = entity.id(), error = %e, "Update failed");
            })?;
        Ok(rows > 0)
    }

    /// Delete by ID. Returns `false` when no row has that ID.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", T::TABLE);
        let rows = self
            .db
            .with_transaction(|tx| Ok(tx.execute(&sql, params![id])?))
            .inspect_err(|e| {
                tracing::error!(table = T::TABLE, id, error = %e, "Delete failed");
            })?;

        if rows == 0 {
            tracing::debug!(table = T::TABLE, id, "Delete matched no rows");
        }
        Ok(rows > 0)
    }
}

/// Run a query and map every row.
pub(crate) fn query_all<T: FromRow>(
    tx: &Transaction<'_>,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<T>> {
    let mut stmt = tx.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(T::from_row(row)?);
    }
    Ok(items)
}

/// Parse helper shared by the field enums.
pub(crate) fn parse_field<F: Copy>(
    entity: &'static str,
    name: &str,
    allowed: &[(&str, F)],
) -> Result<F> {
    allowed
        .iter()
        .find(|(column, _)| *column == name)
        .map(|(_, field)| *field)
        .ok_or_else(|| AppError::DisallowedField {
            entity,
            field: name.to_string(),
        })
}

/// Write error context for an entity.
pub(crate) fn write_error(e: rusqlite::Error, what: String) -> AppError {
    map_write_error(e, &what)
}
