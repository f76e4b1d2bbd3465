use tracing::error;

use query_latency_bench::client::{ClientContext, Probe};
use query_latency_bench::config::ClientConfig;
use query_latency_bench::telemetry;
use query_latency_bench::timing::LineSink;

/// One request to `URL` every `INTERVAL_MS` until the first transport error.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let config = ClientConfig::from_env()?;
    let ctx = ClientContext::new(&config, LineSink::stdout());

    if let Err(e) = Probe::new(ctx, config.interval).run().await {
        error!(error = %e, "probe halted");
        return Err(e.into());
    }
    Ok(())
}
