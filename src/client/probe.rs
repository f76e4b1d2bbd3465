use std::time::Duration;

use tracing::warn;

use super::unit::run_unit;
use super::{ClientContext, ClientError};

/// Steady low-rate probing: one request, sleep, repeat.
///
/// Unlike the dispatcher, the probe stops at the first transport-level
/// failure. Error statuses are printed and probing continues.
pub struct Probe {
    ctx: ClientContext,
    interval: Duration,
    limit: Option<u64>,
}

impl Probe {
    pub fn new(ctx: ClientContext, interval: Duration) -> Self {
        Self {
            ctx,
            interval,
            limit: None,
        }
    }

    /// Stop after `requests` requests instead of running forever.
    pub fn with_limit(mut self, requests: u64) -> Self {
        self.limit = Some(requests);
        self
    }

    /// Returns the number of requests sent once the limit is reached, or the
    /// transport error that halted the loop.
    pub async fn run(&self) -> Result<u64, ClientError> {
        let mut sent = 0u64;
        loop {
            match run_unit(&self.ctx).await {
                Ok(_) => {}
                Err(e) if e.is_transport() => {
                    self.ctx.out.write_line(&e.to_string());
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "probe request failed");
                    self.ctx.out.write_line(&e.to_string());
                }
            }
            sent += 1;

            if self.limit.is_some_and(|limit| sent >= limit) {
                return Ok(sent);
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
