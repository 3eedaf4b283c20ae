use async_trait::async_trait;
use thiserror::Error;

/// Which of the two flat directories an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
  Original,
  Resized,
}

pub struct PutObjectOutput {
  pub size: u64,
}

#[derive(Error, Debug)]
pub enum StorageError {
  #[error("object not found: {0}")]
  NotFound(String),
  #[error("invalid object key: {0:?}")]
  InvalidKey(String),
  #[error("failed to {action} {key}: {source}")]
  Io {
    action: &'static str,
    key: String,
    #[source]
    source: std::io::Error,
  },
}

#[async_trait]
pub trait Storage: Send + Sync {
  async fn download_object(&self, key: &str, image_type: ImageType) -> Result<Vec<u8>, StorageError>;

  /// Writes `data` under `key`, replacing any existing object.
  async fn upload_object(
    &self,
    data: Vec<u8>,
    key: &str,
    mime: &str,
    image_type: ImageType,
  ) -> Result<PutObjectOutput, StorageError>;

  async fn object_exists(&self, key: &str, image_type: ImageType) -> Result<bool, StorageError>;
}
