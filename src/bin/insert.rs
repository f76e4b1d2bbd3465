use clap::Parser;
use tracing::info;

use query_latency_bench::config::StoreConfig;
use query_latency_bench::store::RedisStore;
use query_latency_bench::{inserter, telemetry};

#[derive(Parser, Debug)]
#[command(name = "insert")]
#[command(about = "Insert-or-update N generated rows as one atomic batch")]
struct Args {
    /// Number of rows to write
    rows: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let args = Args::parse();
    let config = StoreConfig::from_env();

    let store = RedisStore::connect(&config.redis_url, config.database_name()).await?;
    let written = inserter::insert_rows(&store, args.rows).await?;

    info!(rows = written, "insert completed");
    Ok(())
}
