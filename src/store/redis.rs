use async_trait::async_trait;
use ::redis::aio::ConnectionManager;
use ::redis::Value as RedisValue;
use tracing::debug;

use super::{Mutation, Row, RowCursor, Statement, Store, StoreError, Table, Value};

/// Redis-backed store.
///
/// Rows live in one hash per row (`{ns}:{table}:row:{key}`) and every row is
/// indexed in a sorted set per partition value, scored by its order column in
/// microseconds (`{ns}:{table}:by_{partition}:{value}`). Statements are Lua
/// scripts; they receive the index prefix as `KEYS[1]`, the row prefix as
/// `KEYS[2]` and their positional parameters as `ARGV`.
///
/// `ConnectionManager` is cheaply cloneable and reconnects on failure, so
/// every query works on its own clone of the shared multiplexed connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisStore {
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(url)
            .map_err(|e| StoreError::Connection(format!("invalid Redis URL \"{url}\": {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(format!("cannot connect to {url}: {e}")))?;

        Ok(Self {
            conn,
            namespace: namespace.into(),
        })
    }

    fn row_prefix(&self, table: &Table) -> String {
        format!("{}:{}:row:", self.namespace, table.name)
    }

    fn index_prefix(&self, table: &Table) -> String {
        format!(
            "{}:{}:by_{}:",
            self.namespace, table.name, table.partition_column
        )
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn query(&self, statement: Statement) -> Result<RowCursor, StoreError> {
        let script = ::redis::Script::new(&statement.text);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(self.index_prefix(&statement.table))
            .key(self.row_prefix(&statement.table));
        for param in &statement.params {
            invocation.arg(arg_text(param));
        }

        let mut conn = self.conn.clone();
        let reply: RedisValue = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let rows: Vec<Result<Row, StoreError>> = match reply {
            RedisValue::Nil => Vec::new(),
            RedisValue::Bulk(items) => items.into_iter().map(row_from_reply).collect(),
            other => vec![Err(StoreError::Decode {
                column: 0,
                expected: "array of rows",
                found: format!("{other:?}"),
            })],
        };
        debug!(table = statement.table.name, rows = rows.len(), "statement returned");

        Ok(Box::pin(tokio_stream::iter(rows)))
    }

    async fn apply(&self, mutations: Vec<Mutation>) -> Result<(), StoreError> {
        let mut pipe = ::redis::pipe();
        pipe.atomic();

        for mutation in &mutations {
            let table = mutation.table;
            let key = mutation
                .key()
                .ok_or_else(|| {
                    StoreError::Write(format!(
                        "mutation on {} has no {} column",
                        table.name, table.key_column
                    ))
                })?
                .to_string();

            // ── Row hash ────────────────────────────────────────
            pipe.cmd("HSET").arg(format!("{}{key}", self.row_prefix(&table)));
            for (column, value) in mutation.columns.iter().zip(&mutation.values) {
                pipe.arg(*column).arg(value.to_string());
            }
            pipe.ignore();

            // ── Partition index ─────────────────────────────────
            if let (Some(partition), Some(order)) = (
                mutation.get(table.partition_column),
                mutation.get(table.order_column),
            ) {
                pipe.cmd("ZADD")
                    .arg(format!("{}{partition}", self.index_prefix(&table)))
                    .arg(score(order)?)
                    .arg(&key)
                    .ignore();
            }
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        debug!(mutations = mutations.len(), "batch applied");
        Ok(())
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

/// Parameters are sent as text; timestamps become epoch microseconds so they
/// compare against index scores.
fn arg_text(value: &Value) -> String {
    match value {
        Value::Timestamp(t) => t.timestamp_micros().to_string(),
        other => other.to_string(),
    }
}

fn score(value: &Value) -> Result<i64, StoreError> {
    match value {
        Value::Timestamp(t) => Ok(t.timestamp_micros()),
        Value::Int(v) => Ok(*v),
        other => Err(StoreError::Write(format!(
            "cannot index by a {} value",
            other.kind()
        ))),
    }
}

fn row_from_reply(reply: RedisValue) -> Result<Row, StoreError> {
    let cells = match reply {
        RedisValue::Bulk(cells) => cells,
        other => {
            return Err(StoreError::Decode {
                column: 0,
                expected: "row array",
                found: format!("{other:?}"),
            })
        }
    };

    cells
        .into_iter()
        .enumerate()
        .map(|(column, cell)| match cell {
            RedisValue::Nil => Ok(Value::Null),
            RedisValue::Int(v) => Ok(Value::Int(v)),
            RedisValue::Data(bytes) => Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned())),
            RedisValue::Status(s) => Ok(Value::Text(s)),
            RedisValue::Okay => Ok(Value::Text("OK".into())),
            nested @ RedisValue::Bulk(_) => Err(StoreError::Decode {
                column,
                expected: "scalar",
                found: format!("{nested:?}"),
            }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Row::new)
}
