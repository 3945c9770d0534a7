/// Data models for the demo tables
///
/// `Note` is the bare two-column shape: hard deletes, no timestamps.
/// `Record` carries managed timestamps and a soft-delete column, and keeps
/// its title in an explicitly named `db_title` column.

use crate::db::entity::{column, Entity, Patch};
use crate::db::mapping::{FieldDef, FieldRole, ModelShape, SqlType, TableMapping};
use crate::db::value::{Field, Value};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;

pub static NOTE_SHAPE: ModelShape = ModelShape {
    name: "Note",
    table: None,
    fields: &[
        FieldDef::primary_key("ID"),
        FieldDef::data("Title", SqlType::Text),
    ],
};

pub static RECORD_SHAPE: ModelShape = ModelShape {
    name: "Record",
    table: None,
    fields: &[
        FieldDef::primary_key("ID"),
        FieldDef::data("Title", SqlType::Varchar(25))
            .column("db_title")
            .not_null(),
        FieldDef::created("CreatedAt"),
        FieldDef::updated("UpdatedAt"),
        FieldDef::deleted("DeletedAt"),
    ],
};

/// Two-field row, hard-deleted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Option<i64>,
    pub title: String,
}

impl Note {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
        }
    }
}

impl Entity for Note {
    fn shape() -> &'static ModelShape {
        &NOTE_SHAPE
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![("Title", Value::from(self.title.as_str()))]
    }

    fn from_row(row: &SqliteRow, mapping: &TableMapping) -> Result<Self> {
        Ok(Self {
            id: Some(column(row, mapping, "ID")?),
            title: column(row, mapping, "Title")?,
        })
    }
}

/// Changes to a `Note`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub title: Field<String>,
}

impl NotePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Field::Set(title.into()),
        }
    }
}

impl Patch for NotePatch {
    type Target = Note;

    fn assignments(&self) -> Vec<(&'static str, Value)> {
        self.title
            .as_ref()
            .into_option()
            .map(|title| ("Title", Value::from(title.as_str())))
            .into_iter()
            .collect()
    }
}

/// Timestamped, soft-deleted row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Option<i64>,
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Entity for Record {
    fn shape() -> &'static ModelShape {
        &RECORD_SHAPE
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![("Title", Value::from(self.title.as_str()))]
    }

    fn set_timestamp(&mut self, role: FieldRole, at: DateTime<Utc>) {
        match role {
            FieldRole::CreatedAt => self.created_at = Some(at),
            FieldRole::UpdatedAt => self.updated_at = Some(at),
            FieldRole::DeletedAt => self.deleted_at = Some(at),
            FieldRole::PrimaryKey | FieldRole::Data => {}
        }
    }

    fn from_row(row: &SqliteRow, mapping: &TableMapping) -> Result<Self> {
        Ok(Self {
            id: Some(column(row, mapping, "ID")?),
            title: column(row, mapping, "Title")?,
            created_at: Some(column(row, mapping, "CreatedAt")?),
            updated_at: Some(column(row, mapping, "UpdatedAt")?),
            deleted_at: column(row, mapping, "DeletedAt")?,
        })
    }
}

/// Changes to a `Record`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub title: Field<String>,
}

impl RecordPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Field::Set(title.into()),
        }
    }
}

impl Patch for RecordPatch {
    type Target = Record;

    fn assignments(&self) -> Vec<(&'static str, Value)> {
        self.title
            .as_ref()
            .into_option()
            .map(|title| ("Title", Value::from(title.as_str())))
            .into_iter()
            .collect()
    }
}
