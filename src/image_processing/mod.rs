use image::ImageFormat;
use thiserror::Error;

pub mod codec;
pub mod intake;
pub mod naming;

#[derive(Error, Debug)]
pub enum ProcessingError {
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("unsupported file type: {0}")]
  UnsupportedType(String),
  #[error("content does not match extension .{claimed} (detected {detected})")]
  ContentMismatch { claimed: String, detected: String },
  #[error("failed to decode image: {0}")]
  DecodeError(String),
  #[error("failed to store image: {0}")]
  StoreError(String),
}

/// A single upload as read from the multipart form. Zero (or a negative
/// value) for `width`/`height` means the dimension was left unset.
#[derive(Debug, Clone)]
pub struct UploadRequest {
  pub data: Vec<u8>,
  pub filename: String,
  pub width: i64,
  pub height: i64,
  pub change_token: Option<String>,
}

/// The sanitized, timestamped copy of an upload kept in the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOriginal {
  pub name: String,
  pub format: ImageFormat,
}

impl StoredOriginal {
  pub fn derived_name(&self) -> String {
    naming::derived_name(&self.name)
  }
}

/// The resized output of a [`StoredOriginal`], kept in the resized directory.
#[derive(Debug, Clone)]
pub struct DerivedArtifact {
  pub name: String,
  pub width: u32,
  pub height: u32,
  pub mime: &'static str,
  pub size: u64,
}

pub fn format_to_mime_ext(format: ImageFormat) -> (&'static str, &'static str) {
  match format {
    ImageFormat::Jpeg => ("image/jpeg", "jpg"),
    ImageFormat::Png => ("image/png", "png"),
    ImageFormat::Gif => ("image/gif", "gif"),
    ImageFormat::Bmp => ("image/bmp", "bmp"),
    ImageFormat::WebP => ("image/webp", "webp"),
    ImageFormat::Tiff => ("image/tiff", "tiff"),
    ImageFormat::Ico => ("image/x-icon", "ico"),
    _ => ("application/octet-stream", "bin"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn derived_name_follows_stored_name() {
    let original = StoredOriginal {
      name: "cat_20240102-153045.jpg".to_owned(),
      format: ImageFormat::Jpeg,
    };

    assert_eq!(original.derived_name(), "resized_cat_20240102-153045.jpg");
  }

  #[test]
  fn unknown_formats_are_octet_stream() {
    assert_eq!(format_to_mime_ext(ImageFormat::Png), ("image/png", "png"));
    assert_eq!(
      format_to_mime_ext(ImageFormat::Farbfeld),
      ("application/octet-stream", "bin")
    );
  }
}
