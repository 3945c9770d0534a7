/// Row selection for queries, updates and deletes
///
/// A `Filter` is a list of `field = value` predicates joined with AND. A
/// `Selector` adds an optional primary key. Mutations refuse selectors that
/// would match every row; that case has its own operation taking `AllRows`.

use crate::db::mapping::{quote, TableMapping};
use crate::db::value::Value;
use crate::error::Result;
use sqlx::{QueryBuilder, Sqlite};

/// Equality predicates on named fields, ANDed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every live row
    pub fn all() -> Self {
        Self::default()
    }

    /// `field = value`; `field` may be the logical name or the column name
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(field, value)
    }

    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Target of an update or delete
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    pub id: Option<i64>,
    pub filter: Filter,
}

impl Selector {
    pub fn id(id: i64) -> Self {
        Self {
            id: Some(id),
            filter: Filter::all(),
        }
    }

    pub fn filter(filter: Filter) -> Self {
        Self { id: None, filter }
    }

    /// Extra predicate on top of the primary key
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = self.filter.and_eq(field, value);
        self
    }

    /// True when the selector would match every row
    pub fn is_unbounded(&self) -> bool {
        self.id.is_none() && self.filter.is_empty()
    }
}

impl From<Filter> for Selector {
    fn from(filter: Filter) -> Self {
        Selector::filter(filter)
    }
}

/// Confirmation token for operations that touch every row
#[derive(Debug, Clone, Copy)]
pub struct AllRows;

/// Whether soft-deleted rows are visible to a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Live,
    Unscoped,
}

/// Append ` WHERE ...` for `selector` to `qb`
///
/// Field names are resolved through the mapping before anything is pushed,
/// so a bad name leaves no half-built statement behind.
pub(crate) fn push_where(
    qb: &mut QueryBuilder<'_, Sqlite>,
    mapping: &TableMapping,
    selector: &Selector,
    scope: Scope,
) -> Result<()> {
    let mut conditions: Vec<(String, Value)> = Vec::new();
    if let Some(id) = selector.id {
        conditions.push((mapping.primary_key().column.clone(), Value::Integer(id)));
    }
    for (field, value) in &selector.filter.predicates {
        let column = mapping.lookup(field)?;
        conditions.push((column.column.clone(), value.clone()));
    }

    let live = match scope {
        Scope::Live => mapping.soft_delete.live_predicate(),
        Scope::Unscoped => None,
    };

    if conditions.is_empty() && live.is_none() {
        return Ok(());
    }

    qb.push(" WHERE ");
    let mut first = true;
    for (column, value) in conditions {
        if !first {
            qb.push(" AND ");
        }
        first = false;
        match value {
            Value::Null => {
                qb.push(format!("{} IS NULL", quote(&column)));
            }
            value => {
                qb.push(format!("{} = ", quote(&column)));
                value.bind_into(qb);
            }
        }
    }
    if let Some(live) = live {
        if !first {
            qb.push(" AND ");
        }
        qb.push(live);
    }
    Ok(())
}
