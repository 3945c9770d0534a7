/// Full scenario: timestamped, soft-deleted records
///
/// Walks through single and batch inserts, `get`/`find`, updates that write
/// an intentional empty title, and soft deletes targeted by id plus title.

use super::{inserted_id, log_json};
use crate::db::{Database, Filter, Record, RecordPatch, Selector, RECORD_SHAPE};
use crate::error::Result;

/// What the full run left behind
#[derive(Debug, Clone)]
pub struct FullOutcome {
    /// Ids in insertion order
    pub inserted: Vec<i64>,
    /// Live records at the end, ordered by id
    pub remaining: Vec<Record>,
}

pub async fn run(db: &Database) -> Result<FullOutcome> {
    tracing::info!("full scenario: records");

    let report = db.sync(&RECORD_SHAPE).await?;
    log_json("sync", &report)?;

    let inserted = create(db).await?;
    read(db).await?;
    update(db, &inserted).await?;
    delete(db, &inserted).await?;

    let remaining: Vec<Record> = db.find(Filter::all()).await?;
    log_json("find", &remaining)?;

    Ok(FullOutcome {
        inserted,
        remaining,
    })
}

async fn create(db: &Database) -> Result<Vec<i64>> {
    let mut message = Record::new("new message");
    let affected = db.insert(&mut message).await?;
    tracing::info!(affected, "inserted");
    log_json("insert", &message)?;

    let mut message2 = Record::new("new message 2");
    let affected = db.insert(&mut message2).await?;
    tracing::info!(affected, "inserted");
    log_json("insert", &message2)?;

    // every record in a batch gets its id back
    let mut batch = vec![Record::new("list 1"), Record::new("list 2")];
    let affected = db.insert_many(&mut batch).await?;
    tracing::info!(affected, "inserted batch");
    log_json("insert", &batch)?;

    let mut ids = vec![inserted_id(&message)?, inserted_id(&message2)?];
    for record in &batch {
        ids.push(inserted_id(record)?);
    }
    Ok(ids)
}

async fn read(db: &Database) -> Result<()> {
    let found: Option<Record> = db.get(Filter::eq("db_title", "list 1")).await?;
    match &found {
        Some(record) => log_json("get", record)?,
        None => tracing::info!("get: no match"),
    }

    let list: Vec<Record> = db.find(Filter::eq("Title", "list 2")).await?;
    log_json("find", &list)?;
    Ok(())
}

async fn update(db: &Database, ids: &[i64]) -> Result<()> {
    let (Some(&first), Some(&list1)) = (ids.first(), ids.get(2)) else {
        return Ok(());
    };

    let affected = db
        .update(Selector::id(list1), &RecordPatch::title("updated record"))
        .await?;
    tracing::info!(affected, id = list1, "updated title");

    // an explicitly set empty title is written, not skipped
    let affected = db.update(Selector::id(first), &RecordPatch::title("")).await?;
    tracing::info!(affected, id = first, "cleared title");

    let affected = db
        .update_fields::<Record, _, _, _>(Selector::id(first), [("db_title", "")])
        .await?;
    tracing::info!(affected, id = first, "cleared title by column");

    tracing::info!("-----after update-----");
    let all: Vec<Record> = db.find(Filter::all()).await?;
    log_json("find", &all)?;
    Ok(())
}

async fn delete(db: &Database, ids: &[i64]) -> Result<()> {
    let Some(&second) = ids.get(1) else {
        return Ok(());
    };

    // id and title must both match
    let affected = db
        .delete::<Record>(Selector::id(second).and_eq("Title", "new message 2"))
        .await?;
    tracing::info!(affected, id = second, "soft deleted");

    let affected = db
        .delete::<Record>(Selector::id(second).and_eq("Title", "new message"))
        .await?;
    tracing::info!(affected, id = second, "soft deleted");

    tracing::info!("-----after delete-----");
    Ok(())
}
