use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

pub const CONFIG_PATH_ENV: &str = "RUSTY_RESIZE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
  pub app: AppConfig,
  pub storage: StorageConfig,
  #[serde(default)]
  pub image: ImageConfig,
  #[serde(default)]
  pub session: SessionConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AppConfig {
  pub listen: String,
  pub metrics_listen: String,
  pub max_body_size_mb: usize,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
  pub enable_openapi: Option<bool>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StorageConfig {
  pub upload_dir: String,
  pub resized_dir: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ImageConfig {
  #[serde(default = "default_allowed_extensions")]
  pub allowed_extensions: Vec<String>,
  #[serde(default = "default_jpeg_quality")]
  pub jpeg_quality: u8,
  /// Largest width or height, in pixels, a resize may produce.
  #[serde(default = "default_max_dimension")]
  pub max_dimension: u32,
}

impl Default for ImageConfig {
  fn default() -> Self {
    Self {
      allowed_extensions: default_allowed_extensions(),
      jpeg_quality: default_jpeg_quality(),
      max_dimension: default_max_dimension(),
    }
  }
}

/// Bounds for the change-token cache used to skip re-storing an original.
#[derive(Deserialize, Clone, Debug)]
pub struct SessionConfig {
  #[serde(default = "default_session_max_entries")]
  pub max_entries: u64,
  #[serde(default = "default_session_idle_timeout_secs")]
  pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      max_entries: default_session_max_entries(),
      idle_timeout_secs: default_session_idle_timeout_secs(),
    }
  }
}

fn default_request_timeout_secs() -> u64 {
  60
}

fn default_allowed_extensions() -> Vec<String> {
  ["bmp", "png", "jpg", "jpeg", "gif"]
    .iter()
    .map(|e| e.to_string())
    .collect()
}

fn default_jpeg_quality() -> u8 {
  85
}

fn default_max_dimension() -> u32 {
  10_000
}

fn default_session_max_entries() -> u64 {
  1024
}

fn default_session_idle_timeout_secs() -> u64 {
  3600
}

pub fn parse(config_path: &str) -> Result<Config> {
  let toml_str = fs::read_to_string(config_path)
    .with_context(|| format!("failed to read config file: {}", config_path))?;

  from_toml(&toml_str).with_context(|| format!("failed to deserialize config: {}", config_path))
}

pub fn from_toml(toml_str: &str) -> Result<Config> {
  let mut cfg: Config = toml::from_str(toml_str)?;

  // Extensions are matched lower-case
  for ext in cfg.image.allowed_extensions.iter_mut() {
    *ext = ext.trim_start_matches('.').to_lowercase();
  }

  Ok(cfg)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn optional_sections_fall_back_to_defaults() {
    let cfg = from_toml(
      r#"
      [app]
      listen = "127.0.0.1:3000"
      metrics_listen = "127.0.0.1:3001"
      max_body_size_mb = 4

      [storage]
      upload_dir = "uploads"
      resized_dir = "resized"
      "#,
    )
    .unwrap();

    assert_eq!(cfg.app.request_timeout_secs, 60);
    assert_eq!(cfg.app.enable_openapi, None);
    assert_eq!(
      cfg.image.allowed_extensions,
      vec!["bmp", "png", "jpg", "jpeg", "gif"]
    );
    assert_eq!(cfg.image.jpeg_quality, 85);
    assert_eq!(cfg.image.max_dimension, 10_000);
    assert_eq!(cfg.session.max_entries, 1024);
  }

  #[test]
  fn allowed_extensions_are_normalized() {
    let cfg = from_toml(
      r#"
      [app]
      listen = "127.0.0.1:3000"
      metrics_listen = "127.0.0.1:3001"
      max_body_size_mb = 4

      [storage]
      upload_dir = "uploads"
      resized_dir = "resized"

      [image]
      allowed_extensions = [".PNG", "Jpg"]
      max_dimension = 2048
      "#,
    )
    .unwrap();

    assert_eq!(cfg.image.allowed_extensions, vec!["png", "jpg"]);
    assert_eq!(cfg.image.max_dimension, 2048);
  }

  #[test]
  fn missing_storage_section_is_an_error() {
    let res = from_toml(
      r#"
      [app]
      listen = "127.0.0.1:3000"
      metrics_listen = "127.0.0.1:3001"
      max_body_size_mb = 4
      "#,
    );

    assert!(res.is_err());
  }
}
