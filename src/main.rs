use anyhow::Result;
use rusty_resize::config;
use rusty_resize::http;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
  // Load config
  let config_path =
    std::env::var(config::CONFIG_PATH_ENV).unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.to_owned());
  let cfg = config::parse(&config_path)?;

  // Initialize tracing
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rusty_resize=debug,tower_http=debug".into()),
    )
    .with(
      tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact(),
    )
    .init();

  tracing::info!(
    upload_dir = %cfg.storage.upload_dir,
    resized_dir = %cfg.storage.resized_dir,
    "loaded config from {}",
    config_path
  );

  // Serve
  let router = http::bootstrap(&cfg)?;

  tokio::try_join!(
    http::serve(router, &cfg.app.listen),
    http::serve_metrics(&cfg.app.metrics_listen),
  )?;

  Ok(())
}
