//! Load-generating client: timed request units, the batched dispatcher and
//! the single-stream probe.

pub mod dispatch;
pub mod probe;
pub mod unit;

use chrono_tz::Tz;

use crate::config::ClientConfig;
use crate::timing::LineSink;

pub use dispatch::{BatchSummary, Dispatcher};
pub use probe::Probe;
pub use unit::{run_unit, UnitReport};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot build request: {0}")]
    Build(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server answered {status}")]
    Status { status: u16 },

    #[error("cannot read response body: {0}")]
    Body(#[source] reqwest::Error),
}

impl ClientError {
    /// Construction and round-trip failures, as opposed to an answer the
    /// server did give.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Build(_) | Self::Transport(_))
    }
}

/// Everything a request unit needs, built once and shared by all units.
#[derive(Clone)]
pub struct ClientContext {
    pub http: reqwest::Client,
    pub url: String,
    pub time_zone: Tz,
    pub print_body: bool,
    pub out: LineSink,
}

impl ClientContext {
    pub fn new(config: &ClientConfig, out: LineSink) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.clone(),
            time_zone: config.time_zone,
            print_body: config.print_body,
            out,
        }
    }
}
