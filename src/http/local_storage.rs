use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::http::storage::{ImageType, PutObjectOutput, Storage, StorageError};
use async_trait::async_trait;
use tracing::debug;

pub struct Client {
  upload_dir: PathBuf,
  resized_dir: PathBuf,
}

impl Client {
  pub fn new(upload_dir: PathBuf, resized_dir: PathBuf) -> Self {
    Self {
      upload_dir,
      resized_dir,
    }
  }

  fn dir(&self, image_type: ImageType) -> &Path {
    match image_type {
      ImageType::Original => &self.upload_dir,
      ImageType::Resized => &self.resized_dir,
    }
  }

  /// Keys are bare filenames; anything that could leave the directory is refused.
  fn object_path(&self, key: &str, image_type: ImageType) -> Result<PathBuf, StorageError> {
    if key.is_empty()
      || key == "."
      || key == ".."
      || key.contains(['/', '\\', '\0'])
      || Path::new(key).is_absolute()
    {
      return Err(StorageError::InvalidKey(key.to_owned()));
    }

    Ok(self.dir(image_type).join(key))
  }
}

#[async_trait]
impl Storage for Client {
  async fn download_object(&self, key: &str, image_type: ImageType) -> Result<Vec<u8>, StorageError> {
    let file_path = self.object_path(key, image_type)?;

    tokio::fs::read(&file_path).await.map_err(|e| match e.kind() {
      ErrorKind::NotFound => StorageError::NotFound(key.to_owned()),
      _ => StorageError::Io {
        action: "read",
        key: key.to_owned(),
        source: e,
      },
    })
  }

  async fn upload_object(
    &self,
    data: Vec<u8>,
    key: &str,
    _mime: &str,
    image_type: ImageType,
  ) -> Result<PutObjectOutput, StorageError> {
    let size = data.len() as u64;

    let file_path = self.object_path(key, image_type)?;

    tokio::fs::create_dir_all(self.dir(image_type))
      .await
      .map_err(|e| StorageError::Io {
        action: "create directory for",
        key: key.to_owned(),
        source: e,
      })?;

    tokio::fs::write(&file_path, &data)
      .await
      .map_err(|e| StorageError::Io {
        action: "write",
        key: key.to_owned(),
        source: e,
      })?;

    debug!(path = %file_path.display(), size, "stored object");

    Ok(PutObjectOutput { size })
  }

  async fn object_exists(&self, key: &str, image_type: ImageType) -> Result<bool, StorageError> {
    let file_path = self.object_path(key, image_type)?;

    tokio::fs::try_exists(&file_path)
      .await
      .map_err(|e| StorageError::Io {
        action: "stat",
        key: key.to_owned(),
        source: e,
      })
  }
}
