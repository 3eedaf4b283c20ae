use anyhow::{Context, Result};
use axum::{
  extract::{DefaultBodyLimit, MatchedPath, Request},
  middleware::{self, Next},
  response::{Html, IntoResponse},
  routing::{get, post},
  Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::future::ready;
use std::{path::PathBuf, sync::Arc};
use tokio::signal;
use tokio::time::{Duration, Instant};
use tower_http::{
  catch_panic::CatchPanicLayer,
  timeout::TimeoutLayer,
  trace::{self, TraceLayer},
};
use tracing::{info, Level};
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::config::Config;

pub mod error;
pub mod local_storage;
mod serve_image;
pub mod session;
pub mod storage;
mod upload_image;

#[derive(OpenApi)]
#[openapi(
  paths(
    upload_image::upload_image,
    serve_image::resized,
    serve_image::original
  ),
  components(
    schemas(upload_image::UploadForm, error::ErrorResponse)
  ),
  info(
    title = "Rusty Resize API",
    version = "0.1.0",
    description = "Upload an image, resize it and fetch the result"
  )
)]
struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
  storage_client: Arc<dyn storage::Storage>,
  sessions: session::SessionCache,
  allowed_extensions: Arc<Vec<String>>,
  jpeg_quality: u8,
  max_dimension: u32,
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><title>Resize an image</title></head>
<body>
  <h1>Resize an image</h1>
  <form method="post" action="/upload" enctype="multipart/form-data">
    <p><input type="file" name="file" accept="image/*"></p>
    <p><label>Width <input type="number" name="width" min="0"></label></p>
    <p><label>Height <input type="number" name="height" min="0"></label></p>
    <p><input type="submit" value="Upload"></p>
  </form>
</body>
</html>
"#;

async fn index() -> Html<&'static str> {
  Html(INDEX_HTML)
}

pub fn bootstrap(cfg: &Config) -> Result<Router> {
  let storage_client: Arc<dyn storage::Storage> = Arc::new(local_storage::Client::new(
    PathBuf::from(&cfg.storage.upload_dir),
    PathBuf::from(&cfg.storage.resized_dir),
  ));

  bootstrap_with_storage(cfg, storage_client)
}

/// Same as [`bootstrap`] with a caller supplied storage backend.
pub fn bootstrap_with_storage(
  cfg: &Config,
  storage_client: Arc<dyn storage::Storage>,
) -> Result<Router> {
  let state = AppState {
    storage_client,
    sessions: session::SessionCache::from_config(&cfg.session),
    allowed_extensions: Arc::new(cfg.image.allowed_extensions.clone()),
    jpeg_quality: cfg.image.jpeg_quality,
    max_dimension: cfg.image.max_dimension,
  };

  let mut app = Router::new()
    .route("/", get(index))
    .route("/upload", post(upload_image::upload_image))
    .route("/resized/:name", get(serve_image::resized))
    .route("/uploads/:name", get(serve_image::original))
    .layer(DefaultBodyLimit::max(cfg.app.max_body_size_mb * 1000 * 1000))
    .with_state(state);

  if cfg.app.enable_openapi.unwrap_or(false) {
    let openapi_doc =
      serde_json::to_value(ApiDoc::openapi()).context("failed to render OpenAPI document")?;
    app = app.merge(Redoc::with_url("/redoc", openapi_doc)).route(
      "/api-docs/openapi.json",
      get(|| async { axum::Json(ApiDoc::openapi()) }),
    );
  }

  let app = app.layer((
    middleware::from_fn(track_metrics),
    TraceLayer::new_for_http()
      .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
      .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    TimeoutLayer::new(Duration::from_secs(cfg.app.request_timeout_secs)),
    CatchPanicLayer::new(),
  ));

  Ok(app)
}

pub async fn serve(router: Router, listen: &str) -> Result<()> {
  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("failed to bind to address {}", listen))?;
  info!("listening on {}", listen);

  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error running HTTP server")
}

async fn healthz() -> &'static str {
  "pong"
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!("failed to install Ctrl+C handler: {}", e);
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!("failed to install signal handler: {}", e);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
      _ = ctrl_c => {},
      _ = terminate => {},
  }
}

pub async fn serve_metrics(listen: &str) -> Result<()> {
  let app = metrics_app()?;

  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("failed to bind to address {}", listen))?;
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error running metrics HTTP server")
}

fn metrics_app() -> Result<Router> {
  let recorder_handle = setup_metrics_recorder()?;
  Ok(
    Router::new()
      .route("/metrics", get(move || ready(recorder_handle.render())))
      .route("/healthz", get(healthz)),
  )
}

fn setup_metrics_recorder() -> Result<PrometheusHandle> {
  const EXPONENTIAL_SECONDS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
  ];

  let handle = PrometheusBuilder::new()
    .set_buckets_for_metric(
      Matcher::Full("http_requests_duration_seconds".to_string()),
      EXPONENTIAL_SECONDS,
    )?
    .install_recorder()?;

  Ok(handle)
}

async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
  let start = Instant::now();
  let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
    matched_path.as_str().to_owned()
  } else {
    req.uri().path().to_owned()
  };
  let method = req.method().clone();

  let response = next.run(req).await;

  let latency = start.elapsed().as_secs_f64();
  let status = response.status().as_u16().to_string();
  let error = response
    .extensions()
    .get::<error::ErrorKind>()
    .map_or("none", |kind| kind.0);

  let labels = [
    ("method", method.to_string()),
    ("path", path),
    ("status", status),
    ("error", error.to_owned()),
  ];

  metrics::counter!("http_requests_total", &labels).increment(1);
  metrics::histogram!("http_requests_duration_seconds", &labels).record(latency);

  response
}
