//! Search against a running OpenSerp server
//!
//! Settings come from `openserp.yml` or `OPENSERP_*` variables.
//!
//! ```text
//! cargo run --example basic_search -- "rust programming"
//! ```

use anyhow::Result;
use openserp_rs::{config, Client, SearchRequest};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "rust programming".to_string());

    let settings = config::load()?;
    let client = Client::from_settings(&settings)?;

    let engines = client.list_engines().await?;
    info!("Server offers {} engines: {}", engines.len(), engines.join(", "));

    let request = SearchRequest::new(query)
        .with_engines(["google", "bing"])
        .with_limit(5);

    let results = client.search(&request).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);

    // Served from cache
    client.search(&request).await?;
    let metrics = client.metrics();
    info!(
        "{} searches, cache hit rate {:.0}%",
        metrics.searches,
        metrics.cache_hit_rate()
    );

    client.close();
    Ok(())
}
