//! Query cases and the machinery that runs them on behalf of a request.

pub mod executor;
pub mod funnel;
pub mod selector;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Statement, StoreError, USER_PARTIAL};

pub use executor::{execute, spawn};
pub use funnel::{funnel, FunnelReceiver, FunnelSender, QueryOutcome};
pub use selector::QuerySelector;

/// Grouped acceptance sum over one partition and a registration-time window.
///
/// `KEYS[1]` is the partition index prefix, `KEYS[2]` the row prefix;
/// `ARGV` = (partition value, window start µs, window end µs).
pub const ACCEPTANCE_BY_PARTITION: &str = r#"
local ids = redis.call('ZRANGEBYSCORE', KEYS[1] .. ARGV[1], ARGV[2], ARGV[3])
if #ids == 0 then
  return {}
end
local total = 0
for _, id in ipairs(ids) do
  local accepted = redis.call('HGET', KEYS[2] .. id, 'policyAcceptance')
  if accepted then
    total = total + tonumber(accepted)
  end
end
return {{tonumber(ARGV[1]), total}}
"#;

// ─── Query cases ─────────────────────────────────────────────────

/// One entry of the query table: a partition selector, a time window and the
/// statement template the window is bound into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCase {
    pub register_from: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_statement")]
    pub statement: String,
}

fn default_statement() -> String {
    ACCEPTANCE_BY_PARTITION.to_owned()
}

impl QueryCase {
    pub fn new(register_from: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            register_from,
            start,
            end,
            statement: default_statement(),
        }
    }

    /// The statement with this case's window bound as positional parameters.
    pub fn statement(&self) -> Statement {
        Statement::new(USER_PARTIAL, self.statement.as_str())
            .bind(self.register_from)
            .bind(self.start)
            .bind(self.end)
    }

    pub fn cardinality(&self) -> Cardinality {
        Cardinality::from_selector(self.register_from)
    }
}

/// Windows sized for roughly 100k, 10k and 100 matching rows respectively.
pub fn default_cases() -> Vec<QueryCase> {
    [
        (5, "2020-01-31T14:58:21.200Z", "2024-01-31T14:58:31.200Z"),
        (1, "2023-11-28T07:23:16.501888Z", "2023-11-28T07:27:16.501888Z"),
        (2, "2023-11-28T07:23:16.501888Z", "2023-11-28T07:23:29.918698Z"),
    ]
    .into_iter()
    .map(|(register_from, start, end)| {
        QueryCase::new(
            register_from,
            start.parse().expect("built-in window start"),
            end.parse().expect("built-in window end"),
        )
    })
    .collect()
}

// ─── Results ─────────────────────────────────────────────────────

/// Coarse expected row volume of a query case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// ~100,000 rows
    TenWan,
    /// ~10,000 rows
    OneWan,
    Hundred,
    Unknown,
}

impl Cardinality {
    pub fn from_selector(register_from: i64) -> Self {
        match register_from {
            5 => Self::TenWan,
            1 => Self::OneWan,
            2 => Self::Hundred,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TenWan => "10w",
            Self::OneWan => "1w",
            Self::Hundred => "100",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// One `key: value` line per row, each newline-terminated.
    pub summary: String,
    pub cardinality: Cardinality,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Error: {0}")]
    Store(#[from] StoreError),

    #[error("Error: query task ended without reporting a result")]
    Abandoned,
}
