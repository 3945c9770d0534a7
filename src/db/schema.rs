/// Schema reconciliation
///
/// Creates the table for a shape, or adds the columns an existing table is
/// missing. Never drops or retypes anything.

use crate::db::mapping::{FieldRole, ModelShape, TableMapping};
use crate::db::Database;
use crate::error::{CrudError, Result};
use serde::Serialize;

/// What `sync` changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub table: String,
    pub created: bool,
    pub added_columns: Vec<String>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        !self.created && self.added_columns.is_empty()
    }
}

impl Database {
    /// Make the backing table match `shape`
    ///
    /// Idempotent: a second call on an up-to-date table changes nothing.
    ///
    /// # Returns
    /// * `Ok(SyncReport)` - Table created and/or columns added
    /// * `Err(CrudError::Schema)` - The existing table lacks the primary key column
    pub async fn sync(&self, shape: &ModelShape) -> Result<SyncReport> {
        let mapping = self.mapping(shape)?;
        let existing = self.table_columns(&mapping.table).await?;

        let mut report = SyncReport {
            table: mapping.table.clone(),
            ..SyncReport::default()
        };

        if existing.is_empty() {
            sqlx::query(&create_table_sql(&mapping))
                .execute(self.pool())
                .await?;
            report.created = true;
            tracing::info!(table = %mapping.table, "created table");
            return Ok(report);
        }

        let has = |column: &str| existing.iter().any(|c| c.eq_ignore_ascii_case(column));

        let pk = mapping.primary_key();
        if !has(&pk.column) {
            return Err(CrudError::Schema(format!(
                "table {} has no primary key column '{}' and one cannot be added",
                mapping.table, pk.column
            )));
        }

        for column in mapping.columns.iter().filter(|c| c.role != FieldRole::PrimaryKey) {
            if has(&column.column) {
                continue;
            }
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                mapping.quoted_table(),
                column.ddl(true)
            );
            sqlx::query(&sql).execute(self.pool()).await?;
            tracing::info!(table = %mapping.table, column = %column.column, "added column");
            report.added_columns.push(column.column.clone());
        }

        Ok(report)
    }

    /// Column names of `table`, empty if it does not exist
    pub async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let columns: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info(?)")
            .bind(table)
            .fetch_all(self.pool())
            .await?;

        Ok(columns.into_iter().map(|(name,)| name).collect())
    }
}

fn create_table_sql(mapping: &TableMapping) -> String {
    let columns = mapping
        .columns
        .iter()
        .map(|c| c.ddl(false))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        mapping.quoted_table(),
        columns
    )
}
