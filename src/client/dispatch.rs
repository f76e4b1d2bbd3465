use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

use super::unit::run_unit;
use super::ClientContext;
use crate::correlation::CorrelationId;

/// What one tick's batch did, available once every unit in it has finished.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub tick: u64,
    pub launched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Correlation IDs of the units that succeeded.
    pub ids: Vec<CorrelationId>,
}

/// Fires `concurrency` timed requests at every tick.
///
/// Ticks never wait for earlier batches: each batch runs on its own task and
/// is joined there, so slow responses overlap with later ticks. In-flight
/// requests are unbounded unless a ceiling is set with
/// [`Dispatcher::with_max_in_flight`].
pub struct Dispatcher {
    ctx: Arc<ClientContext>,
    concurrency: usize,
    interval: Duration,
    in_flight: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(ctx: ClientContext, concurrency: usize, interval: Duration) -> Self {
        Self {
            ctx: Arc::new(ctx),
            concurrency,
            interval,
            in_flight: None,
        }
    }

    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.in_flight = Some(Arc::new(Semaphore::new(limit)));
        self
    }

    /// Run forever.
    pub async fn run(&self) {
        info!(
            url = %self.ctx.url,
            concurrency = self.concurrency,
            interval_ms = self.interval.as_millis() as u64,
            "dispatching"
        );

        let mut ticker = tokio::time::interval(self.interval);
        let mut tick = 0u64;
        loop {
            ticker.tick().await;
            // Detached: the batch reports its own completion.
            drop(self.launch_batch(tick));
            tick += 1;
        }
    }

    /// Run `ticks` ticks and return the handles of every batch launched.
    /// The first tick fires immediately.
    pub async fn run_ticks(&self, ticks: u64) -> Vec<JoinHandle<BatchSummary>> {
        let mut ticker = tokio::time::interval(self.interval);
        let mut batches = Vec::with_capacity(ticks as usize);
        for tick in 0..ticks {
            ticker.tick().await;
            batches.push(self.launch_batch(tick));
        }
        batches
    }

    /// Spawn one batch of units. The returned handle completes when every
    /// unit of the batch has finished.
    pub fn launch_batch(&self, tick: u64) -> JoinHandle<BatchSummary> {
        let mut units = JoinSet::new();
        for _ in 0..self.concurrency {
            let ctx = self.ctx.clone();
            let in_flight = self.in_flight.clone();
            units.spawn(async move {
                let _permit = match in_flight {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = run_unit(&ctx).await;
                if let Err(e) = &outcome {
                    ctx.out.write_line(&e.to_string());
                }
                outcome
            });
        }

        let launched = self.concurrency;
        tokio::spawn(async move {
            let mut summary = BatchSummary {
                tick,
                launched,
                ..Default::default()
            };

            // ── Batch barrier ───────────────────────────────────
            while let Some(joined) = units.join_next().await {
                match joined {
                    Ok(Ok(report)) => {
                        summary.succeeded += 1;
                        summary.ids.push(report.id);
                    }
                    Ok(Err(e)) => {
                        debug!(tick, error = %e, transport = e.is_transport(), "request unit failed");
                        summary.failed += 1;
                    }
                    Err(e) => {
                        debug!(tick, error = %e, "request unit panicked");
                        summary.failed += 1;
                    }
                }
            }

            debug!(
                tick,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "batch complete"
            );
            summary
        })
    }
}
