use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Mutation, Row, RowCursor, Statement, Store, StoreError, Value};

/// In-process store used by tests and by local runs without Redis.
///
/// It understands one statement shape, the grouped window aggregate: the
/// positional parameters are `[partition value, window start, window end]`
/// and the result is at most one row `[partition value, sum(measure)]`.
/// The statement text itself is not interpreted.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    /// table name → row key → row
    tables: HashMap<&'static str, HashMap<String, Mutation>>,
    /// Size of every batch passed to `apply`, in order.
    batches: Vec<usize>,
    /// When set, every cursor fails after yielding this many rows.
    fail_after: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent cursor fail after `rows` rows.
    pub fn fail_cursor_after(&self, rows: usize) {
        self.inner.lock().fail_after = Some(rows);
    }

    /// Sizes of all batches applied so far.
    pub fn batches(&self) -> Vec<usize> {
        self.inner.lock().batches.clone()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.inner.lock().tables.get(table).map_or(0, HashMap::len)
    }

    pub fn keys(&self, table: &str) -> Vec<String> {
        self.inner
            .lock()
            .tables
            .get(table)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn query(&self, statement: Statement) -> Result<RowCursor, StoreError> {
        let (partition, start, end) = match statement.params.as_slice() {
            [p, s, e] => (p, s, e),
            params => {
                return Err(StoreError::Query(format!(
                    "expected 3 positional parameters, got {}",
                    params.len()
                )))
            }
        };
        let (Value::Timestamp(start), Value::Timestamp(end)) = (start, end) else {
            return Err(StoreError::Query("window bounds must be timestamps".into()));
        };

        let table = statement.table;
        let inner = self.inner.lock();

        let mut matched = 0usize;
        let mut total = 0i64;
        for row in inner.tables.get(table.name).into_iter().flat_map(HashMap::values) {
            let in_partition = row.get(table.partition_column) == Some(partition);
            let in_window = matches!(
                row.get(table.order_column),
                Some(Value::Timestamp(t)) if t >= start && t <= end
            );
            if in_partition && in_window {
                matched += 1;
                if let Some(Value::Int(v)) = row.get(table.measure_column) {
                    total += v;
                }
            }
        }

        let mut rows: Vec<Result<Row, StoreError>> = Vec::new();
        if matched > 0 {
            rows.push(Ok(Row::new(vec![partition.clone(), Value::Int(total)])));
        }
        if let Some(limit) = inner.fail_after {
            rows.truncate(limit);
            rows.push(Err(StoreError::Query(format!(
                "cursor aborted after {limit} rows"
            ))));
        }

        Ok(Box::pin(tokio_stream::iter(rows)))
    }

    async fn apply(&self, mutations: Vec<Mutation>) -> Result<(), StoreError> {
        // Validate the whole batch first so a bad mutation leaves nothing behind.
        let mut keyed = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            let key = mutation
                .key()
                .ok_or_else(|| {
                    StoreError::Write(format!(
                        "mutation on {} has no {} column",
                        mutation.table.name, mutation.table.key_column
                    ))
                })?
                .to_string();
            keyed.push((key, mutation));
        }

        let mut inner = self.inner.lock();
        inner.batches.push(keyed.len());
        for (key, mutation) in keyed {
            inner
                .tables
                .entry(mutation.table.name)
                .or_default()
                .insert(key, mutation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::USER_PARTIAL;
    use chrono::{Duration, Utc};
    use tokio_stream::StreamExt;

    fn row(key: &str, partition: i64, accepted: i64, at: chrono::DateTime<Utc>) -> Mutation {
        Mutation::insert_or_update(
            USER_PARTIAL,
            &["uuid", "registerFrom", "policyAcceptance", "registerTime"],
            vec![key.into(), partition.into(), accepted.into(), at.into()],
        )
    }

    async fn collect(store: &MemoryStore, stmt: Statement) -> Vec<Result<Row, StoreError>> {
        store.query(stmt).await.unwrap().collect().await
    }

    #[tokio::test]
    async fn aggregates_partition_inside_window() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .apply(vec![
                row("a", 1, 1, now),
                row("b", 1, 3, now),
                row("c", 2, 5, now),
                row("d", 1, 7, now - Duration::days(2)),
            ])
            .await
            .unwrap();

        let stmt = Statement::new(USER_PARTIAL, "")
            .bind(1i64)
            .bind(now - Duration::hours(1))
            .bind(now + Duration::hours(1));
        let rows = collect(&store, stmt).await;

        assert_eq!(rows.len(), 1);
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.int(0).unwrap(), 1);
        assert_eq!(row.int(1).unwrap(), 4);
    }

    #[tokio::test]
    async fn empty_window_yields_no_rows() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let stmt = Statement::new(USER_PARTIAL, "").bind(2i64).bind(now).bind(now);
        assert!(collect(&store, stmt).await.is_empty());
    }

    #[tokio::test]
    async fn injected_failure_ends_cursor_with_error() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.apply(vec![row("a", 5, 1, now)]).await.unwrap();
        store.fail_cursor_after(0);

        let stmt = Statement::new(USER_PARTIAL, "").bind(5i64).bind(now).bind(now);
        let rows = collect(&store, stmt).await;
        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0], Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn apply_upserts_and_records_batches() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.apply(vec![row("a", 1, 0, now), row("b", 1, 0, now)]).await.unwrap();
        store.apply(vec![row("a", 2, 1, now)]).await.unwrap();

        assert_eq!(store.batches(), vec![2, 1]);
        assert_eq!(store.row_count("User_partial"), 2);
    }

    #[tokio::test]
    async fn apply_rejects_keyless_batch_atomically() {
        let store = MemoryStore::new();
        let keyless = Mutation::insert_or_update(USER_PARTIAL, &["registerFrom"], vec![1i64.into()]);
        let now = Utc::now();

        let err = store.apply(vec![row("a", 1, 0, now), keyless]).await;
        assert!(matches!(err, Err(StoreError::Write(_))));
        assert_eq!(store.row_count("User_partial"), 0);
        assert!(store.batches().is_empty());
    }
}
