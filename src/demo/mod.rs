/// Demo scenarios
///
/// Each scenario is a straight-line script: reconcile the schema, insert,
/// query, update and delete, logging JSON snapshots along the way. The
/// first error ends the run.

pub mod basic;
pub mod full;

use crate::db::{Database, Entity};
use crate::error::{CrudError, Result};
use clap::ValueEnum;
use serde::Serialize;

/// Which scenario(s) to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Two-field notes, hard deletes
    Basic,
    /// Timestamped records, soft deletes
    Full,
    #[default]
    All,
}

/// Run the selected scenario(s) in order
pub async fn run(db: &Database, scenario: Scenario) -> Result<()> {
    if matches!(scenario, Scenario::Basic | Scenario::All) {
        basic::run(db).await?;
    }
    if matches!(scenario, Scenario::Full | Scenario::All) {
        full::run(db).await?;
    }
    Ok(())
}

/// Log `value` as a single JSON line
pub(crate) fn log_json<T: Serialize + ?Sized>(label: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    tracing::info!("{}: {}", label, json);
    Ok(())
}

/// Id written back by a successful insert
pub(crate) fn inserted_id<E: Entity>(record: &E) -> Result<i64> {
    record
        .id()
        .ok_or_else(|| CrudError::Generic(format!("{} has no id after insert", E::shape().name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Filter, Note, Record};
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::EnvFilter;

    #[tokio::test]
    async fn test_run_all() {
        let db = Database::new_test().await.unwrap();

        run(&db, Scenario::All).await.unwrap();

        let notes: Vec<Note> = db.find(Filter::all()).await.unwrap();
        assert_eq!(notes.len(), 1);
        let records: Vec<Record> = db.find(Filter::all()).await.unwrap();
        assert!(!records.is_empty());
    }

    #[tokio::test]
    async fn test_run_basic_only() {
        let db = Database::new_test().await.unwrap();

        run(&db, Scenario::Basic).await.unwrap();

        assert!(db.table_columns("record").await.unwrap().is_empty());
        assert_eq!(db.table_columns("note").await.unwrap(), vec!["id", "title"]);
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_snapshot_visible_under_crate_filter() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("crud_demo_lib=debug"))
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            log_json("numbers", &[1, 2, 3]).unwrap();
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("numbers: [1,2,3]"), "output: {}", output);
    }
}
