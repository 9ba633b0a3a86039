use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let settings = depot::config::Settings::from_env();
    info!(
        target: "depot",
        "depot starting: RUST_LOG='{}', http_port={}, gateway_url='{}', index_url='{}', queue_url='{}'",
        rust_log, settings.http_port, settings.gateway_url, settings.index_url, settings.queue_url
    );

    depot::server::run(settings).await
}
