use image::ImageFormat;

use super::ProcessingError;

/// Lower-cased text after the last `.` of a client supplied filename.
pub fn claimed_extension(filename: &str) -> Option<String> {
  let (_, ext) = filename.rsplit_once('.')?;
  if ext.is_empty() {
    return None;
  }

  Some(ext.to_lowercase())
}

/// Checks the claimed filename against the allow-list and returns its extension.
pub fn validate_extension(filename: &str, allowed: &[String]) -> Result<String, ProcessingError> {
  if filename.is_empty() {
    return Err(ProcessingError::BadRequest("no file selected".to_owned()));
  }

  match claimed_extension(filename) {
    Some(ext) if allowed.contains(&ext) => Ok(ext),
    Some(ext) => Err(ProcessingError::UnsupportedType(format!(
      "extension .{} is not one of: {}",
      ext,
      allowed.join(", ")
    ))),
    None => Err(ProcessingError::UnsupportedType(format!(
      "{:?} has no file extension",
      filename
    ))),
  }
}

pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
  image::guess_format(data).ok()
}

/// Makes sure the bytes really are what the extension says they are.
/// `jpg` and `jpeg` name the same format.
pub fn validate_content(extension: &str, data: &[u8]) -> Result<ImageFormat, ProcessingError> {
  if data.is_empty() {
    return Err(ProcessingError::BadRequest("uploaded file is empty".to_owned()));
  }

  let claimed = ImageFormat::from_extension(extension).ok_or_else(|| {
    ProcessingError::UnsupportedType(format!("extension .{} is not an image format", extension))
  })?;

  match sniff_format(data) {
    Some(detected) if detected == claimed => Ok(detected),
    Some(detected) => Err(ProcessingError::ContentMismatch {
      claimed: extension.to_owned(),
      detected: format!("{:?}", detected).to_lowercase(),
    }),
    None => Err(ProcessingError::ContentMismatch {
      claimed: extension.to_owned(),
      detected: "unknown".to_owned(),
    }),
  }
}

/// Parses a `width`/`height` form value. An empty value means unset (0).
/// Values above `max_dimension` are refused.
pub fn parse_dimension(field: &str, value: &str, max_dimension: u32) -> Result<i64, ProcessingError> {
  let value = value.trim();
  if value.is_empty() {
    return Ok(0);
  }

  let side = value
    .parse::<i64>()
    .map_err(|_| ProcessingError::BadRequest(format!("{} must be a whole number, got {:?}", field, value)))?;

  if side > i64::from(max_dimension) {
    return Err(ProcessingError::BadRequest(format!(
      "{} must be at most {} pixels, got {}",
      field, max_dimension, side
    )));
  }

  Ok(side)
}
