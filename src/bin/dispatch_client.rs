use query_latency_bench::client::{ClientContext, Dispatcher};
use query_latency_bench::config::ClientConfig;
use query_latency_bench::telemetry;
use query_latency_bench::timing::LineSink;

/// Fires `CONCURRENT` timed requests at `URL` every `INTERVAL_MS`, forever.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let config = ClientConfig::from_env()?;
    let ctx = ClientContext::new(&config, LineSink::stdout());

    let mut dispatcher = Dispatcher::new(ctx, config.concurrency, config.interval);
    if let Some(limit) = config.max_in_flight {
        dispatcher = dispatcher.with_max_in_flight(limit);
    }

    dispatcher.run().await;
    Ok(())
}
