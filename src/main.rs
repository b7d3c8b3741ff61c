use roomcast::{AppState, config::Config, storage};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let storage = storage::connect(&config).await;
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    roomcast::serve(listener, AppState::new(config, storage)).await
}
