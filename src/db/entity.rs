/// Traits tying Rust structs to mapped tables
///
/// An `Entity` knows its static shape, how to hand over its data-field values
/// and how to rebuild itself from a row. A `Patch` is the presence-tracked
/// counterpart used for updates.

use crate::db::mapping::{FieldRole, ModelShape, TableMapping};
use crate::db::value::Value;
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, Type};

/// A struct stored in its own table
pub trait Entity: Sized + Send + Unpin + 'static {
    fn shape() -> &'static ModelShape;

    /// `None` until the row has been inserted
    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Data-field values keyed by logical field name
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Receive an automatically assigned timestamp
    fn set_timestamp(&mut self, _role: FieldRole, _at: DateTime<Utc>) {}

    fn from_row(row: &SqliteRow, mapping: &TableMapping) -> Result<Self>;
}

/// Field assignments for an update of `Target`
///
/// Only fields that are explicitly set are returned, so an empty string or
/// zero is written when asked for and never by accident.
pub trait Patch {
    type Target: Entity;

    fn assignments(&self) -> Vec<(&'static str, Value)>;
}

/// Decode a logical field from a row through the mapping
pub fn column<'r, T>(row: &'r SqliteRow, mapping: &TableMapping, field: &str) -> Result<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    let column = mapping.column(field)?;
    Ok(row.try_get(column)?)
}
