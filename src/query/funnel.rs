//! Single-use hand-off of a query outcome from the executor task back to the
//! request handler.
//!
//! Both halves are consumed by use: the sender can deliver at most one
//! outcome and the receiver can be awaited exactly once. A funnel belongs to
//! one request and is dropped with it.

use tokio::sync::oneshot;
use tracing::debug;

use super::{QueryError, QueryResult};

pub type QueryOutcome = Result<QueryResult, QueryError>;

pub fn funnel() -> (FunnelSender, FunnelReceiver) {
    let (tx, rx) = oneshot::channel();
    (FunnelSender(tx), FunnelReceiver(rx))
}

pub struct FunnelSender(oneshot::Sender<QueryOutcome>);

impl FunnelSender {
    pub fn send(self, outcome: QueryOutcome) {
        if self.0.send(outcome).is_err() {
            debug!("query outcome dropped: handler is gone");
        }
    }
}

pub struct FunnelReceiver(oneshot::Receiver<QueryOutcome>);

impl FunnelReceiver {
    /// Waits for the executor to finish. If it finished without sending
    /// (panicked or was dropped) the outcome is [`QueryError::Abandoned`].
    pub async fn recv(self) -> QueryOutcome {
        self.0.await.unwrap_or(Err(QueryError::Abandoned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Cardinality;

    #[tokio::test]
    async fn delivers_the_single_outcome() {
        let (tx, rx) = funnel();
        tokio::spawn(async move {
            tx.send(Ok(QueryResult {
                summary: "registerFrom: 2, policyAcceptance_sum: 3\n".into(),
                cardinality: Cardinality::Hundred,
            }));
        });

        let result = rx.recv().await.unwrap();
        assert_eq!(result.cardinality, Cardinality::Hundred);
        assert!(result.summary.ends_with('\n'));
    }

    #[tokio::test]
    async fn delivers_errors_without_a_label() {
        let (tx, rx) = funnel();
        tx.send(Err(QueryError::Store(crate::store::StoreError::Query(
            "boom".into(),
        ))));

        let err = rx.recv().await.unwrap_err();
        assert_eq!(err.to_string(), "Error: query failed: boom");
    }

    #[tokio::test]
    async fn dropped_sender_is_abandoned() {
        let (tx, rx) = funnel();
        tokio::spawn(async move { drop(tx) }).await.unwrap();

        assert!(matches!(rx.recv().await, Err(QueryError::Abandoned)));
    }

    #[test]
    fn send_after_receiver_dropped_is_harmless() {
        let (tx, rx) = funnel();
        drop(rx);
        tx.send(Err(QueryError::Abandoned));
    }
}
