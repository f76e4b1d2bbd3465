//! Latency probe for a query-dispatch service.
//!
//! The client side fires batches of timed HTTP requests, each tagged with a
//! correlation ID. The server side answers each request by running one
//! randomly chosen aggregate query against the store on a separate task and
//! logging a timing record under the same correlation ID.

use std::sync::Arc;

use chrono_tz::Tz;

pub mod client;
pub mod config;
pub mod correlation;
pub mod handlers;
pub mod inserter;
pub mod middleware;
pub mod query;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod timing;

use query::QueryCase;
use store::Store;
use timing::LineSink;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
/// Built once at startup and never mutated afterwards.
pub struct AppState {
    /// Backing store, shared read-only by every request.
    pub store: Arc<dyn Store>,

    /// Query table the selector draws from.
    pub query_cases: Vec<QueryCase>,

    /// Zone used for human-readable timestamps in timing records.
    pub time_zone: Tz,

    /// Where timing records are written.
    pub timing: LineSink,

    /// Whether timing records carry `row_scanned`.
    pub log_row_scanned: bool,
}
