/// Basic scenario: two-field notes
///
/// No timestamps and no soft-delete column, so the delete at the end
/// removes the row for good.

use super::{inserted_id, log_json};
use crate::db::{Database, Filter, Note, NotePatch, Selector, NOTE_SHAPE};
use crate::error::Result;

const FIRST_TITLE: &str = "first note";
const SECOND_TITLE: &str = "second note";
const UPDATED_TITLE: &str = "first note, updated";

/// What the basic run left behind
#[derive(Debug, Clone)]
pub struct BasicOutcome {
    pub first: Note,
    pub second: Note,
    pub remaining: Vec<Note>,
}

pub async fn run(db: &Database) -> Result<BasicOutcome> {
    tracing::info!("basic scenario: notes");

    let report = db.sync(&NOTE_SHAPE).await?;
    log_json("sync", &report)?;

    let mut first = Note::new(FIRST_TITLE);
    let mut second = Note::new(SECOND_TITLE);
    db.insert(&mut first).await?;
    db.insert(&mut second).await?;

    // Look each one up by title, then list everything
    let by_title_1: Option<Note> = db.get(Filter::eq("Title", FIRST_TITLE)).await?;
    let by_title_2: Option<Note> = db.get(Filter::eq("Title", SECOND_TITLE)).await?;
    log_json("get", &by_title_1)?;
    log_json("get", &by_title_2)?;
    let all: Vec<Note> = db.find(Filter::all()).await?;
    log_json("find", &all)?;

    let first_id = inserted_id(&first)?;
    let second_id = inserted_id(&second)?;

    let affected = db
        .update(Selector::id(first_id), &NotePatch::title(UPDATED_TITLE))
        .await?;
    tracing::info!(affected, "-----after update-----");
    let all: Vec<Note> = db.find(Filter::all()).await?;
    log_json("find", &all)?;

    let affected = db.delete::<Note>(Selector::id(second_id)).await?;
    tracing::info!(affected, "-----after delete-----");
    let remaining: Vec<Note> = db.find(Filter::all()).await?;
    log_json("find", &remaining)?;

    first.title = UPDATED_TITLE.to_string();
    Ok(BasicOutcome {
        first,
        second,
        remaining,
    })
}
