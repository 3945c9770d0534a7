/// SQL values and presence-tracked fields
///
/// `Value` is what gets bound into generated statements. `Field<T>` is how
/// patches tell "leave this column alone" apart from "write this value",
/// including an empty string or zero.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

/// A single bindable SQL value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Bind this value as the next placeholder of `qb`
    pub(crate) fn bind_into(self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Value::Null => {
                qb.push_bind(Option::<String>::None);
            }
            Value::Integer(v) => {
                qb.push_bind(v);
            }
            Value::Text(v) => {
                qb.push_bind(v);
            }
            Value::Timestamp(v) => {
                qb.push_bind(v);
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Presence-tracked patch field
///
/// `Set("")` writes an empty string; `Unset` leaves the column untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Unset,
    Set(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Unset
    }
}

impl<T> Field<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Field::Set(_))
    }

    pub fn as_ref(&self) -> Field<&T> {
        match self {
            Field::Set(v) => Field::Set(v),
            Field::Unset => Field::Unset,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Set(v) => Some(v),
            Field::Unset => None,
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(v: T) -> Self {
        Field::Set(v)
    }
}
