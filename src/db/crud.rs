/// Create, read, update and delete for mapped entities
///
/// Statements are generated from the resolved `TableMapping` with
/// `sqlx::QueryBuilder`; every value travels as a bind parameter and every
/// identifier has been validated by the mapping.

use crate::db::entity::{Entity, Patch};
use crate::db::mapping::{quote, FieldRole, SoftDeletePolicy, TableMapping};
use crate::db::selector::{push_where, AllRows, Filter, Scope, Selector};
use crate::db::value::Value;
use crate::db::Database;
use crate::error::{CrudError, Result};
use sqlx::{QueryBuilder, Row, Sqlite};

impl Database {
    /// Insert one record and write its id and timestamps back
    ///
    /// # Returns
    /// * `Ok(1)` - Rows affected
    /// * `Err(CrudError::IdAlreadyAssigned)` - The record already has an id
    pub async fn insert<E: Entity>(&self, record: &mut E) -> Result<u64> {
        let mapping = self.mapping(E::shape())?;
        self.insert_mapped(&mapping, record).await
    }

    /// Insert records in order; ids come back strictly increasing
    ///
    /// Every record is checked before the first row is written.
    pub async fn insert_many<E: Entity>(&self, records: &mut [E]) -> Result<u64> {
        let mapping = self.mapping(E::shape())?;
        if let Some(id) = records.iter().find_map(|r| r.id()) {
            return Err(CrudError::IdAlreadyAssigned(id));
        }

        let mut affected = 0;
        for record in records.iter_mut() {
            affected += self.insert_mapped(&mapping, record).await?;
        }
        Ok(affected)
    }

    async fn insert_mapped<E: Entity>(&self, mapping: &TableMapping, record: &mut E) -> Result<u64> {
        if let Some(id) = record.id() {
            return Err(CrudError::IdAlreadyAssigned(id));
        }

        let mut columns: Vec<(String, Value)> = Vec::new();
        for (field, value) in record.values() {
            let column = mapping.lookup(field)?;
            if column.role == FieldRole::Data {
                columns.push((column.column.clone(), value));
            }
        }
        let now = self.clock().now();
        for (column, at) in mapping.timestamps.on_insert(now) {
            columns.push((column, Value::Timestamp(at)));
        }

        let mut qb = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {}", mapping.quoted_table()));
        if columns.is_empty() {
            qb.push(" DEFAULT VALUES");
        } else {
            let names = columns
                .iter()
                .map(|(column, _)| quote(column))
                .collect::<Vec<_>>()
                .join(", ");
            qb.push(format!(" ({}) VALUES (", names));
            for (i, (_, value)) in columns.into_iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                value.bind_into(&mut qb);
            }
            qb.push(")");
        }
        qb.push(format!(" RETURNING {}", quote(&mapping.primary_key().column)));

        let row = qb.build().fetch_one(self.pool()).await?;
        let id: i64 = row.try_get(0)?;

        record.set_id(id);
        if mapping.timestamps.created.is_some() {
            record.set_timestamp(FieldRole::CreatedAt, now);
        }
        if mapping.timestamps.updated.is_some() {
            record.set_timestamp(FieldRole::UpdatedAt, now);
        }
        tracing::debug!(table = %mapping.table, id, "inserted row");

        Ok(1)
    }

    /// First live record matching `filter`, lowest id first
    pub async fn get<E: Entity>(&self, filter: Filter) -> Result<Option<E>> {
        let mapping = self.mapping(E::shape())?;
        let mut found = self
            .select(&mapping, &Selector::filter(filter), Scope::Live, Some(1))
            .await?;
        Ok(found.pop())
    }

    /// Live record by primary key
    pub async fn get_by_id<E: Entity>(&self, id: i64) -> Result<Option<E>> {
        let mapping = self.mapping(E::shape())?;
        let mut found = self
            .select(&mapping, &Selector::id(id), Scope::Live, Some(1))
            .await?;
        Ok(found.pop())
    }

    /// Record by primary key, soft-deleted or not
    pub async fn get_unscoped<E: Entity>(&self, id: i64) -> Result<Option<E>> {
        let mapping = self.mapping(E::shape())?;
        let mut found = self
            .select(&mapping, &Selector::id(id), Scope::Unscoped, Some(1))
            .await?;
        Ok(found.pop())
    }

    /// All live records matching `filter`, ordered by primary key
    pub async fn find<E: Entity>(&self, filter: Filter) -> Result<Vec<E>> {
        let mapping = self.mapping(E::shape())?;
        self.select(&mapping, &Selector::filter(filter), Scope::Live, None)
            .await
    }

    /// Number of live records matching `filter`
    pub async fn count<E: Entity>(&self, filter: Filter) -> Result<i64> {
        let mapping = self.mapping(E::shape())?;
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", mapping.quoted_table()));
        push_where(&mut qb, &mapping, &Selector::filter(filter), Scope::Live)?;

        let row = qb.build().fetch_one(self.pool()).await?;
        Ok(row.try_get(0)?)
    }

    async fn select<E: Entity>(
        &self,
        mapping: &TableMapping,
        selector: &Selector,
        scope: Scope,
        limit: Option<i64>,
    ) -> Result<Vec<E>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM {}",
            mapping.select_list(),
            mapping.quoted_table()
        ));
        push_where(&mut qb, mapping, selector, scope)?;
        qb.push(format!(" ORDER BY {} ASC", quote(&mapping.primary_key().column)));
        if let Some(limit) = limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit);
        }

        let rows = qb.build().fetch_all(self.pool()).await?;
        rows.iter().map(|row| E::from_row(row, mapping)).collect()
    }

    /// Write the set fields of `patch` to the live rows `selector` matches
    ///
    /// `updated_at` is refreshed even when the patch is empty. The count is
    /// rows matched, not rows whose values changed.
    ///
    /// # Returns
    /// * `Err(CrudError::UnboundedMutation)` - Selector without id or predicate
    /// * `Err(CrudError::EmptyUpdate)` - Nothing set and no updated-at column
    pub async fn update<P: Patch>(&self, selector: impl Into<Selector>, patch: &P) -> Result<u64> {
        let mapping = self.mapping(<P::Target as Entity>::shape())?;
        let assignments = owned(patch.assignments());
        self.update_bounded(&mapping, &selector.into(), assignments)
            .await
    }

    /// Update from untyped `field or column -> value` pairs
    pub async fn update_fields<E, I, K, V>(&self, selector: impl Into<Selector>, assignments: I) -> Result<u64>
    where
        E: Entity,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mapping = self.mapping(E::shape())?;
        let assignments = assignments
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.update_bounded(&mapping, &selector.into(), assignments)
            .await
    }

    /// Apply `patch` to every live row
    pub async fn update_all<P: Patch>(&self, _confirm: AllRows, patch: &P) -> Result<u64> {
        let mapping = self.mapping(<P::Target as Entity>::shape())?;
        let assignments = owned(patch.assignments());
        self.update_where(&mapping, &Selector::default(), assignments)
            .await
    }

    async fn update_bounded(
        &self,
        mapping: &TableMapping,
        selector: &Selector,
        assignments: Vec<(String, Value)>,
    ) -> Result<u64> {
        if selector.is_unbounded() {
            return Err(CrudError::UnboundedMutation("update"));
        }
        self.update_where(mapping, selector, assignments).await
    }

    async fn update_where(
        &self,
        mapping: &TableMapping,
        selector: &Selector,
        assignments: Vec<(String, Value)>,
    ) -> Result<u64> {
        let mut sets: Vec<(String, Value)> = Vec::new();
        for (field, value) in assignments {
            let column = mapping.lookup(&field)?;
            if column.role != FieldRole::Data {
                return Err(CrudError::Schema(format!(
                    "{}.{} is managed automatically and cannot be assigned",
                    mapping.shape, column.field
                )));
            }
            set_column(&mut sets, column.column.clone(), value);
        }
        if let Some((column, at)) = mapping.timestamps.on_update(self.clock().now()) {
            set_column(&mut sets, column, Value::Timestamp(at));
        }
        if sets.is_empty() {
            return Err(CrudError::EmptyUpdate);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", mapping.quoted_table()));
        for (i, (column, value)) in sets.into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(format!("{} = ", quote(&column)));
            value.bind_into(&mut qb);
        }
        push_where(&mut qb, mapping, selector, Scope::Live)?;

        let result = qb.build().execute(self.pool()).await?;
        tracing::debug!(table = %mapping.table, rows = result.rows_affected(), "updated rows");
        Ok(result.rows_affected())
    }

    /// Delete the live rows `selector` matches
    ///
    /// Soft delete when the shape has a deleted-at field, hard delete
    /// otherwise. A selector without id or predicate is refused; use
    /// `delete_all` for that.
    pub async fn delete<E: Entity>(&self, selector: impl Into<Selector>) -> Result<u64> {
        let selector = selector.into();
        if selector.is_unbounded() {
            return Err(CrudError::UnboundedMutation("delete"));
        }
        let mapping = self.mapping(E::shape())?;
        self.delete_where(&mapping, &selector).await
    }

    /// Delete every live row
    pub async fn delete_all<E: Entity>(&self, _confirm: AllRows) -> Result<u64> {
        let mapping = self.mapping(E::shape())?;
        self.delete_where(&mapping, &Selector::default()).await
    }

    async fn delete_where(&self, mapping: &TableMapping, selector: &Selector) -> Result<u64> {
        let mut qb = match &mapping.soft_delete {
            SoftDeletePolicy::Soft { column } => {
                let mut qb = QueryBuilder::<Sqlite>::new(format!(
                    "UPDATE {} SET {} = ",
                    mapping.quoted_table(),
                    quote(column)
                ));
                qb.push_bind(self.clock().now());
                qb
            }
            SoftDeletePolicy::Hard => {
                QueryBuilder::<Sqlite>::new(format!("DELETE FROM {}", mapping.quoted_table()))
            }
        };
        push_where(&mut qb, mapping, selector, Scope::Live)?;

        let result = qb.build().execute(self.pool()).await?;
        tracing::debug!(
            table = %mapping.table,
            soft = mapping.soft_delete.is_soft(),
            rows = result.rows_affected(),
            "deleted rows"
        );
        Ok(result.rows_affected())
    }
}

fn owned(assignments: Vec<(&'static str, Value)>) -> Vec<(String, Value)> {
    assignments
        .into_iter()
        .map(|(field, value)| (field.to_string(), value))
        .collect()
}

/// Last assignment to a column wins
fn set_column(sets: &mut Vec<(String, Value)>, column: String, value: Value) {
    match sets.iter_mut().find(|(c, _)| *c == column) {
        Some(slot) => slot.1 = value,
        None => sets.push((column, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Note, NotePatch, Record, RecordPatch, NOTE_SHAPE, RECORD_SHAPE};
    use tokio_test::{assert_err, assert_ok};

    async fn setup() -> Database {
        let db = Database::new_test().await.unwrap();
        db.sync(&NOTE_SHAPE).await.unwrap();
        db.sync(&RECORD_SHAPE).await.unwrap();
        db
    }

    fn titles(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let db = setup().await;

        let mut record = Record::new("new message");
        let affected = db.insert(&mut record).await.unwrap();

        assert_eq!(affected, 1);
        let id = record.id.unwrap();
        assert!(id > 0);
        assert!(record.created_at.is_some());
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.deleted_at.is_none());

        let stored: Record = db.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_insert_ids_strictly_increase() {
        let db = setup().await;

        let mut first = Record::new("one");
        let mut second = Record::new("two");
        db.insert(&mut first).await.unwrap();
        db.insert(&mut second).await.unwrap();

        assert!(second.id.unwrap() > first.id.unwrap());
    }

    #[tokio::test]
    async fn test_insert_many_preserves_order() {
        let db = setup().await;

        let mut batch = vec![Record::new("list 1"), Record::new("list 2"), Record::new("list 3")];
        let affected = db.insert_many(&mut batch).await.unwrap();
        assert_eq!(affected, 3);

        let ids: Vec<i64> = batch.iter().map(|r| r.id.unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let all: Vec<Record> = db.find(Filter::all()).await.unwrap();
        assert_eq!(titles(&all), vec!["list 1", "list 2", "list 3"]);
        assert_eq!(all.iter().map(|r| r.id.unwrap()).collect::<Vec<_>>(), ids);
    }

    #[tokio::test]
    async fn test_insert_rejects_assigned_id() {
        let db = setup().await;

        let mut batch = vec![Record::new("fresh"), Record { id: Some(9), ..Record::new("stale") }];
        match db.insert_many(&mut batch).await {
            Err(CrudError::IdAlreadyAssigned(9)) => {}
            other => panic!("Expected IdAlreadyAssigned, got {:?}", other),
        }
        // nothing written
        assert_eq!(db.count::<Record>(Filter::all()).await.unwrap(), 0);
        assert!(batch[0].id.is_none());
    }

    #[tokio::test]
    async fn test_get_and_find_by_title() {
        let db = setup().await;

        let mut x = Record::new("X");
        db.insert(&mut x).await.unwrap();
        db.insert(&mut Record::new("Y")).await.unwrap();

        let found: Option<Record> = db.get(Filter::eq("Title", "X")).await.unwrap();
        assert_eq!(found, Some(x.clone()));

        // column name works too
        let list: Vec<Record> = db.find(Filter::eq("db_title", "X")).await.unwrap();
        assert_eq!(list, vec![x]);

        let none: Option<Record> = db.get(Filter::eq("Title", "Z")).await.unwrap();
        assert!(none.is_none());
        let empty: Vec<Record> = db.find(Filter::eq("Title", "Z")).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_filter_unknown_field() {
        let db = setup().await;

        let result = db.find::<Record>(Filter::eq("Body", "x")).await;
        assert!(matches!(result, Err(CrudError::UnknownField { .. })));
    }

    #[tokio::test]
    async fn test_update_by_id_changes_only_title_and_updated_at() {
        let db = setup().await;

        let mut record = Record::new("before");
        db.insert(&mut record).await.unwrap();
        let id = record.id.unwrap();

        let affected = db.update(Selector::id(id), &RecordPatch::title("after")).await.unwrap();
        assert_eq!(affected, 1);

        let stored: Record = db.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "after");
        assert_eq!(stored.id, record.id);
        assert_eq!(stored.created_at, record.created_at);
        assert_eq!(stored.deleted_at, None);
        assert!(stored.updated_at > record.updated_at);
    }

    #[tokio::test]
    async fn test_empty_patch_still_advances_updated_at() {
        let db = setup().await;

        let mut record = Record::new("same");
        db.insert(&mut record).await.unwrap();
        let id = record.id.unwrap();

        let affected = db.update(Selector::id(id), &RecordPatch::default()).await.unwrap();
        assert_eq!(affected, 1);

        let stored: Record = db.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "same");
        assert!(stored.updated_at > record.updated_at);
    }

    #[tokio::test]
    async fn test_update_can_write_empty_value() {
        let db = setup().await;

        let mut record = Record::new("not empty");
        db.insert(&mut record).await.unwrap();
        let id = record.id.unwrap();

        db.update(Selector::id(id), &RecordPatch::title("")).await.unwrap();
        let stored: Record = db.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "");

        db.update_fields::<Record, _, _, _>(Selector::id(id), [("db_title", "via map")])
            .await
            .unwrap();
        let stored: Record = db.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "via map");
    }

    #[tokio::test]
    async fn test_varchar_length_enforced() {
        let db = setup().await;

        let mut too_long = Record::new("x".repeat(200));
        assert_err!(db.insert(&mut too_long).await);
        assert_eq!(too_long.id, None);

        let mut exact = Record::new("x".repeat(25));
        assert_ok!(db.insert(&mut exact).await);

        let result = db
            .update(Selector::id(exact.id.unwrap()), &RecordPatch::title("y".repeat(26)))
            .await;
        assert!(matches!(result, Err(CrudError::Database(_))));
    }

    #[tokio::test]
    async fn test_update_without_timestamps_needs_fields() {
        let db = setup().await;

        let mut note = Note::new("n");
        db.insert(&mut note).await.unwrap();

        let result = db.update(Selector::id(note.id.unwrap()), &NotePatch::default()).await;
        assert!(matches!(result, Err(CrudError::EmptyUpdate)));
    }

    #[tokio::test]
    async fn test_update_rejects_managed_fields() {
        let db = setup().await;

        let mut record = Record::new("r");
        db.insert(&mut record).await.unwrap();

        let result = db
            .update_fields::<Record, _, _, _>(Selector::id(record.id.unwrap()), [("ID", 99_i64)])
            .await;
        assert!(matches!(result, Err(CrudError::Schema(_))));
    }

    #[tokio::test]
    async fn test_unbounded_update_rejected() {
        let db = setup().await;

        db.insert_many(&mut [Record::new("a"), Record::new("b")]).await.unwrap();

        let result = db.update(Filter::all(), &RecordPatch::title("all")).await;
        assert!(matches!(result, Err(CrudError::UnboundedMutation("update"))));

        let affected = db.update_all(AllRows, &RecordPatch::title("all")).await.unwrap();
        assert_eq!(affected, 2);
        let all: Vec<Record> = db.find(Filter::all()).await.unwrap();
        assert_eq!(titles(&all), vec!["all", "all"]);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_row() {
        let db = setup().await;

        let mut record = Record::new("doomed");
        db.insert(&mut record).await.unwrap();
        let id = record.id.unwrap();

        let affected = db.delete::<Record>(Selector::id(id)).await.unwrap();
        assert_eq!(affected, 1);

        assert!(db.get_by_id::<Record>(id).await.unwrap().is_none());
        assert!(db.find::<Record>(Filter::all()).await.unwrap().is_empty());

        let raw: Record = db.get_unscoped(id).await.unwrap().unwrap();
        assert!(raw.is_deleted());
        assert_eq!(raw.title, "doomed");

        // already deleted rows are not touched again
        let again = db.delete::<Record>(Selector::id(id)).await.unwrap();
        assert_eq!(again, 0);
        let updated = db.update(Selector::id(id), &RecordPatch::title("back")).await.unwrap();
        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn test_delete_by_id_and_filter() {
        let db = setup().await;

        let mut batch = vec![Record::new("new message"), Record::new("new message 2")];
        db.insert_many(&mut batch).await.unwrap();
        let second = batch[1].id.unwrap();

        // id matches but title does not
        let affected = db
            .delete::<Record>(Selector::id(second).and_eq("Title", "new message"))
            .await
            .unwrap();
        assert_eq!(affected, 0);

        let affected = db
            .delete::<Record>(Selector::id(second).and_eq("Title", "new message 2"))
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let left: Vec<Record> = db.find(Filter::all()).await.unwrap();
        assert_eq!(titles(&left), vec!["new message"]);
    }

    #[tokio::test]
    async fn test_unfiltered_delete_requires_all_rows() {
        let db = setup().await;

        db.insert_many(&mut [Record::new("a"), Record::new("b")]).await.unwrap();

        let result = db.delete::<Record>(Selector::default()).await;
        assert!(matches!(result, Err(CrudError::UnboundedMutation("delete"))));
        assert_eq!(db.count::<Record>(Filter::all()).await.unwrap(), 2);

        let affected = db.delete_all::<Record>(AllRows).await.unwrap();
        assert_eq!(affected, 2);
        assert_eq!(db.count::<Record>(Filter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_hard_delete_removes_row() {
        let db = setup().await;

        let mut note = Note::new("gone");
        assert_ok!(db.insert(&mut note).await);
        let id = note.id.unwrap();

        assert_eq!(db.delete::<Note>(Selector::id(id)).await.unwrap(), 1);

        let (left,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM note")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(left, 0);
        assert!(db.get_unscoped::<Note>(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsynced_table_is_database_error() {
        let db = Database::new_test().await.unwrap();

        let result = db.find::<Note>(Filter::all()).await;
        assert!(matches!(assert_err!(result), CrudError::Database(_)));
    }

    #[tokio::test]
    async fn test_end_to_end_sequence() {
        let db = setup().await;

        let mut a = Record::new("A");
        let mut b = Record::new("B");
        db.insert(&mut a).await.unwrap();
        db.insert(&mut b).await.unwrap();

        let all: Vec<Record> = db.find(Filter::all()).await.unwrap();
        assert_eq!(titles(&all), vec!["A", "B"]);

        db.update(Selector::id(a.id.unwrap()), &RecordPatch::title("A2"))
            .await
            .unwrap();
        let all: Vec<Record> = db.find(Filter::all()).await.unwrap();
        assert_eq!(titles(&all), vec!["A2", "B"]);

        db.delete::<Record>(Selector::id(b.id.unwrap())).await.unwrap();
        let all: Vec<Record> = db.find(Filter::all()).await.unwrap();
        assert_eq!(titles(&all), vec!["A2"]);
    }
}
