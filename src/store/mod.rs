//! Narrow interface to the backing store.
//!
//! The query side only needs two things from a store: run a parameterized
//! statement and hand back a cursor over its rows, and apply a batch of
//! insert-or-update mutations atomically. Everything else (connection
//! management, key layout, script caching) stays inside the adapters.

pub mod memory;
pub mod redis;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_stream::Stream;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

// ─── Errors ──────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("row decode failed at column {column}: expected {expected}, found {found}")]
    Decode {
        column: usize,
        expected: &'static str,
        found: String,
    },

    #[error("batch write failed: {0}")]
    Write(String),
}

// ─── Values & rows ───────────────────────────────────────────────

/// A single typed cell, either bound as a statement parameter or read back
/// from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

/// One result row, columns in statement order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decode column `column` as an integer.
    pub fn int(&self, column: usize) -> Result<i64, StoreError> {
        match self.values.get(column) {
            Some(Value::Int(v)) => Ok(*v),
            Some(other) => Err(StoreError::Decode {
                column,
                expected: "int",
                found: other.kind().to_owned(),
            }),
            None => Err(StoreError::Decode {
                column,
                expected: "int",
                found: format!("row of {} columns", self.values.len()),
            }),
        }
    }
}

/// Read-only, forward-only iteration over a statement's rows.
/// Dropping the cursor stops the iteration.
pub type RowCursor = Pin<Box<dyn Stream<Item = Result<Row, StoreError>> + Send>>;

// ─── Tables, statements, mutations ───────────────────────────────

/// Describes how a table is addressed by the adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    /// Column holding the unique row identifier.
    pub key_column: &'static str,
    /// Column the aggregate queries group by.
    pub partition_column: &'static str,
    /// Column the time-window filter applies to.
    pub order_column: &'static str,
    /// Column summed by the aggregate queries.
    pub measure_column: &'static str,
}

pub const USER_PARTIAL: Table = Table {
    name: "User_partial",
    key_column: "uuid",
    partition_column: "registerFrom",
    order_column: "registerTime",
    measure_column: "policyAcceptance",
};

/// A statement template plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub table: Table,
    pub text: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(table: Table, text: impl Into<String>) -> Self {
        Self {
            table,
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Append the next positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Insert-or-update of a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub table: Table,
    pub columns: Vec<&'static str>,
    pub values: Vec<Value>,
}

impl Mutation {
    pub fn insert_or_update(table: Table, columns: &[&'static str], values: Vec<Value>) -> Self {
        Self {
            table,
            columns: columns.to_vec(),
            values,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn key(&self) -> Option<&Value> {
        self.get(self.table.key_column)
    }
}

// ─── Store trait ─────────────────────────────────────────────────

/// Shared, read-mostly handle to the backing store. Implementations must be
/// safe for concurrent use from many request handlers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip used to warm the connection at startup.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Run `statement` and return a cursor over its rows.
    async fn query(&self, statement: Statement) -> Result<RowCursor, StoreError>;

    /// Apply all `mutations` as one atomic write.
    async fn apply(&self, mutations: Vec<Mutation>) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_decodes_matching_column() {
        let row = Row::new(vec![Value::Int(5), Value::Int(42)]);
        assert_eq!(row.int(0).unwrap(), 5);
        assert_eq!(row.int(1).unwrap(), 42);
    }

    #[test]
    fn int_rejects_mismatched_or_missing_column() {
        let row = Row::new(vec![Value::Text("five".into())]);

        match row.int(0) {
            Err(StoreError::Decode {
                column: 0,
                expected: "int",
                found,
            }) => assert_eq!(found, "text"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(row.int(3), Err(StoreError::Decode { column: 3, .. })));
    }

    #[test]
    fn mutation_looks_up_key_column() {
        let m = Mutation::insert_or_update(
            USER_PARTIAL,
            &["registerFrom", "uuid"],
            vec![Value::Int(1), Value::from("abc")],
        );
        assert_eq!(m.key(), Some(&Value::Text("abc".into())));
        assert_eq!(m.get("registerFrom"), Some(&Value::Int(1)));
        assert_eq!(m.get("missing"), None);
    }

    #[test]
    fn statement_binds_in_order() {
        let stmt = Statement::new(USER_PARTIAL, "script").bind(2i64).bind("x");
        assert_eq!(stmt.params, vec![Value::Int(2), Value::Text("x".into())]);
    }
}
