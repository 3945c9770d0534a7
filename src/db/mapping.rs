/// Record shapes and the policies that map them onto tables
///
/// A `ModelShape` is a static description of an entity: logical field names,
/// SQL types and roles. Resolving it with a `NameMapper` yields a
/// `TableMapping` with concrete column names plus the timestamp and
/// soft-delete policies the CRUD layer applies.

use crate::error::{CrudError, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};

/// Identifiers we are willing to splice into SQL
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Value used for NOT NULL timestamp columns added to tables that already have rows
const EPOCH_LITERAL: &str = "'1970-01-01T00:00:00+00:00'";

fn identifier_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).ok()).as_ref()
}

/// Check that `name` is a plain SQL identifier
pub fn validate_identifier(name: &str) -> Result<()> {
    if identifier_regex().is_some_and(|re| re.is_match(name)) {
        Ok(())
    } else {
        Err(CrudError::InvalidIdentifier(name.to_string()))
    }
}

/// Double-quote an identifier that already passed validation
pub(crate) fn quote(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Column type as declared in DDL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Text,
    Varchar(u32),
    DateTime,
}

impl SqlType {
    pub fn ddl(&self) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({})", len),
            SqlType::DateTime => "DATETIME".to_string(),
        }
    }

    /// Default literal for NOT NULL columns added after the fact
    pub fn default_literal(&self) -> &'static str {
        match self {
            SqlType::Integer => "0",
            SqlType::Text | SqlType::Varchar(_) => "''",
            SqlType::DateTime => EPOCH_LITERAL,
        }
    }
}

/// What the CRUD layer does with a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    PrimaryKey,
    Data,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

/// One field of a shape
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub column: Option<&'static str>,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub role: FieldRole,
}

impl FieldDef {
    /// Auto-increment integer primary key
    pub const fn primary_key(name: &'static str) -> Self {
        Self {
            name,
            column: None,
            sql_type: SqlType::Integer,
            not_null: true,
            role: FieldRole::PrimaryKey,
        }
    }

    pub const fn data(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            column: None,
            sql_type,
            not_null: false,
            role: FieldRole::Data,
        }
    }

    /// Stamped on insert
    pub const fn created(name: &'static str) -> Self {
        Self {
            name,
            column: None,
            sql_type: SqlType::DateTime,
            not_null: true,
            role: FieldRole::CreatedAt,
        }
    }

    /// Stamped on insert and on every update
    pub const fn updated(name: &'static str) -> Self {
        Self {
            name,
            column: None,
            sql_type: SqlType::DateTime,
            not_null: true,
            role: FieldRole::UpdatedAt,
        }
    }

    /// Its presence turns deletes into soft deletes
    pub const fn deleted(name: &'static str) -> Self {
        Self {
            name,
            column: None,
            sql_type: SqlType::DateTime,
            not_null: false,
            role: FieldRole::DeletedAt,
        }
    }

    /// Explicit column name, bypassing the name mapper
    pub const fn column(self, column: &'static str) -> Self {
        Self {
            column: Some(column),
            ..self
        }
    }

    pub const fn not_null(self) -> Self {
        Self {
            not_null: true,
            ..self
        }
    }
}

/// Static description of an entity
#[derive(Debug)]
pub struct ModelShape {
    pub name: &'static str,
    pub table: Option<&'static str>,
    pub fields: &'static [FieldDef],
}

/// Field name to column name convention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameMapper {
    /// Underscore before every capital: `ID` -> `i_d`
    Snake,
    /// Initialism aware: `ID` -> `id`, `HTTPServer` -> `http_server`
    #[default]
    Gonic,
    /// Column name equals field name
    Same,
}

impl NameMapper {
    pub fn map(&self, name: &str) -> String {
        match self {
            NameMapper::Snake => snake(name),
            NameMapper::Gonic => gonic(name),
            NameMapper::Same => name.to_string(),
        }
    }
}

impl FromStr for NameMapper {
    type Err = CrudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snake" => Ok(NameMapper::Snake),
            "gonic" => Ok(NameMapper::Gonic),
            "same" => Ok(NameMapper::Same),
            other => Err(CrudError::Config(format!("unknown naming mapper '{}'", other))),
        }
    }
}

fn snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

fn gonic(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next_is_lower)
                {
                    out.push('_');
                }
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Wall clock that never hands out the same instant twice
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// `max(now, last + 1µs)`
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut now = Utc::now();
        if let Some(prev) = *last {
            let floor = prev + Duration::microseconds(1);
            if now < floor {
                now = floor;
            }
        }
        *last = Some(now);
        now
    }
}

/// Columns stamped automatically on insert/update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampPolicy {
    pub created: Option<String>,
    pub updated: Option<String>,
}

impl TimestampPolicy {
    /// Assignments added to every insert
    pub fn on_insert(&self, at: DateTime<Utc>) -> Vec<(String, DateTime<Utc>)> {
        self.created
            .iter()
            .chain(self.updated.iter())
            .map(|column| (column.clone(), at))
            .collect()
    }

    /// Assignment added to every update
    pub fn on_update(&self, at: DateTime<Utc>) -> Option<(String, DateTime<Utc>)> {
        self.updated.as_ref().map(|column| (column.clone(), at))
    }
}

/// How deletes are carried out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftDeletePolicy {
    Hard,
    Soft { column: String },
}

impl SoftDeletePolicy {
    /// Predicate that hides soft-deleted rows, if any
    pub fn live_predicate(&self) -> Option<String> {
        match self {
            SoftDeletePolicy::Hard => None,
            SoftDeletePolicy::Soft { column } => Some(format!("{} IS NULL", quote(column))),
        }
    }

    pub fn is_soft(&self) -> bool {
        matches!(self, SoftDeletePolicy::Soft { .. })
    }
}

/// A field bound to its concrete column
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub field: &'static str,
    pub column: String,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub role: FieldRole,
}

impl ColumnMapping {
    /// Column definition for CREATE TABLE / ADD COLUMN
    pub fn ddl(&self, adding: bool) -> String {
        let mut def = format!("{} {}", quote(&self.column), self.sql_type.ddl());
        if self.role == FieldRole::PrimaryKey {
            def.push_str(" PRIMARY KEY AUTOINCREMENT");
            return def;
        }
        if self.not_null {
            def.push_str(" NOT NULL");
            if adding {
                def.push_str(" DEFAULT ");
                def.push_str(self.sql_type.default_literal());
            }
        }
        // SQLite ignores the declared VARCHAR length
        if let SqlType::Varchar(len) = self.sql_type {
            def.push_str(&format!(" CHECK (length({}) <= {})", quote(&self.column), len));
        }
        def
    }
}

/// A shape resolved against a name mapper
#[derive(Debug, Clone)]
pub struct TableMapping {
    pub shape: &'static str,
    pub table: String,
    pub columns: Vec<ColumnMapping>,
    pub timestamps: TimestampPolicy,
    pub soft_delete: SoftDeletePolicy,
    primary_key: usize,
}

impl TableMapping {
    pub fn resolve(shape: &ModelShape, mapper: NameMapper) -> Result<Self> {
        let table = shape
            .table
            .map(str::to_string)
            .unwrap_or_else(|| mapper.map(shape.name));
        validate_identifier(&table)?;

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(shape.fields.len());
        let mut timestamps = TimestampPolicy::default();
        let mut soft_delete = SoftDeletePolicy::Hard;
        let mut primary_keys = Vec::new();

        for field in shape.fields {
            let column = field
                .column
                .map(str::to_string)
                .unwrap_or_else(|| mapper.map(field.name));
            validate_identifier(&column)?;
            if !seen.insert(column.to_ascii_lowercase()) {
                return Err(CrudError::Schema(format!(
                    "{} maps two fields to column '{}'",
                    shape.name, column
                )));
            }

            let duplicate_role = |what: &str| {
                CrudError::Schema(format!("{} declares more than one {} field", shape.name, what))
            };
            match field.role {
                FieldRole::PrimaryKey => primary_keys.push(columns.len()),
                FieldRole::Data => {}
                FieldRole::CreatedAt => {
                    if timestamps.created.replace(column.clone()).is_some() {
                        return Err(duplicate_role("created"));
                    }
                }
                FieldRole::UpdatedAt => {
                    if timestamps.updated.replace(column.clone()).is_some() {
                        return Err(duplicate_role("updated"));
                    }
                }
                FieldRole::DeletedAt => {
                    if soft_delete.is_soft() {
                        return Err(duplicate_role("deleted"));
                    }
                    soft_delete = SoftDeletePolicy::Soft {
                        column: column.clone(),
                    };
                }
            }

            columns.push(ColumnMapping {
                field: field.name,
                column,
                sql_type: field.sql_type,
                not_null: field.not_null,
                role: field.role,
            });
        }

        let primary_key = match primary_keys.as_slice() {
            [index] => *index,
            found => {
                return Err(CrudError::Schema(format!(
                    "{} must declare exactly one primary key, found {}",
                    shape.name,
                    found.len()
                )))
            }
        };

        Ok(Self {
            shape: shape.name,
            table,
            columns,
            timestamps,
            soft_delete,
            primary_key,
        })
    }

    pub fn primary_key(&self) -> &ColumnMapping {
        &self.columns[self.primary_key]
    }

    /// Look up by logical field name or by column name
    pub fn lookup(&self, name: &str) -> Result<&ColumnMapping> {
        self.columns
            .iter()
            .find(|c| c.field == name)
            .or_else(|| self.columns.iter().find(|c| c.column == name))
            .ok_or_else(|| CrudError::UnknownField {
                shape: self.shape,
                field: name.to_string(),
            })
    }

    /// Column name of a logical field; used when decoding rows
    pub fn column(&self, field: &str) -> Result<&str> {
        self.lookup(field).map(|c| c.column.as_str())
    }

    /// Columns written from the caller's values on insert
    pub fn data_columns(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.columns.iter().filter(|c| c.role == FieldRole::Data)
    }

    pub fn quoted_table(&self) -> String {
        quote(&self.table)
    }

    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote(&c.column))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
