use std::fmt::Write as _;
use std::sync::Arc;

use tokio_stream::StreamExt;
use tracing::debug;

use super::funnel::{funnel, FunnelReceiver, QueryOutcome};
use super::{QueryCase, QueryResult};
use crate::store::Store;

/// Run `case` on its own task and return the receiving half of its funnel.
pub fn spawn(store: Arc<dyn Store>, case: QueryCase) -> FunnelReceiver {
    let (tx, rx) = funnel();
    tokio::spawn(async move {
        let outcome = execute(store.as_ref(), &case).await;
        tx.send(outcome);
    });
    rx
}

/// Bind the case's window, drain the cursor and summarize every row.
///
/// The first cursor or decode error ends the iteration; no partial summary
/// and no cardinality label are reported in that case.
pub async fn execute(store: &dyn Store, case: &QueryCase) -> QueryOutcome {
    let mut cursor = store.query(case.statement()).await?;

    let mut summary = String::new();
    let mut rows = 0usize;
    while let Some(row) = cursor.next().await {
        let row = row?;
        let register_from = row.int(0)?;
        let accepted = row.int(1)?;
        let _ = writeln!(
            summary,
            "registerFrom: {register_from}, policyAcceptance_sum: {accepted}"
        );
        rows += 1;
    }

    debug!(register_from = case.register_from, rows, "query drained");
    Ok(QueryResult {
        summary,
        cardinality: case.cardinality(),
    })
}
