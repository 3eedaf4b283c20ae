use chrono::{Local, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

use super::ProcessingError;

pub const DERIVED_PREFIX: &str = "resized_";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

lazy_static! {
  static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
  static ref UNSAFE_CHARS_REGEX: Regex = Regex::new(r"[^A-Za-z0-9_.-]").unwrap();
  static ref DOT_RUN_REGEX: Regex = Regex::new(r"\.{2,}").unwrap();
}

/// Reduces an untrusted filename to a bare name made of `[A-Za-z0-9_.-]`.
/// May return an empty string when nothing usable is left.
pub fn sanitize_filename(raw: &str) -> String {
  let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();

  let joined = WHITESPACE_REGEX.replace_all(last.trim(), "_");
  let stripped = UNSAFE_CHARS_REGEX.replace_all(&joined, "");
  let collapsed = DOT_RUN_REGEX.replace_all(&stripped, ".");

  collapsed.trim_matches(|c| c == '.' || c == '_').to_owned()
}

/// `<base>_<YYYYmmdd-HHMMSS>.<ext>` for the sanitized filename.
pub fn storage_name(raw: &str, at: NaiveDateTime) -> Result<String, ProcessingError> {
  let safe = sanitize_filename(raw);

  let (base, ext) = safe
    .rsplit_once('.')
    .filter(|(base, ext)| !base.is_empty() && !ext.is_empty())
    .ok_or_else(|| ProcessingError::BadRequest(format!("{:?} is not a usable filename", raw)))?;

  Ok(format!(
    "{}_{}.{}",
    base,
    at.format(TIMESTAMP_FORMAT),
    ext.to_lowercase()
  ))
}

pub fn storage_name_now(raw: &str) -> Result<String, ProcessingError> {
  storage_name(raw, Local::now().naive_local())
}

pub fn derived_name(storage_name: &str) -> String {
  format!("{}{}", DERIVED_PREFIX, storage_name)
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;
  use std::path::Path;

  fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
      .unwrap()
      .and_hms_opt(15, 30, 45)
      .unwrap()
  }

  #[test]
  fn timestamp_goes_between_base_and_extension() {
    assert_eq!(
      storage_name("photo.jpg", at()).unwrap(),
      "photo_20240102-153045.jpg"
    );
    assert_eq!(
      storage_name("Holiday Pic.PNG", at()).unwrap(),
      "Holiday_Pic_20240102-153045.png"
    );
  }

  #[test]
  fn traversal_is_stripped() {
    for raw in [
      "../../etc/passwd.png",
      "..\\..\\windows\\system32\\evil.png",
      "/absolute/path/evil.png",
      "....//....//evil.png",
    ] {
      let name = storage_name(raw, at()).unwrap();
      assert!(!name.contains('/'), "{}", name);
      assert!(!name.contains('\\'), "{}", name);
      assert!(!name.contains(".."), "{}", name);

      let upload_dir = Path::new("uploads");
      let joined = upload_dir.join(&name);
      assert_eq!(joined.parent(), Some(upload_dir));
    }

    assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
  }

  #[test]
  fn unsafe_characters_are_dropped() {
    assert_eq!(sanitize_filename("  my  <cat>;|.gif "), "my_cat.gif");
    assert_eq!(sanitize_filename("a..b.png"), "a.b.png");
    assert_eq!(sanitize_filename("..."), "");
  }

  #[test]
  fn names_without_base_or_extension_are_rejected() {
    assert!(matches!(
      storage_name("../..", at()),
      Err(ProcessingError::BadRequest(_))
    ));
    assert!(matches!(
      storage_name("png", at()),
      Err(ProcessingError::BadRequest(_))
    ));
    assert!(matches!(
      storage_name("日本.png", at()),
      Err(ProcessingError::BadRequest(_))
    ));
  }

  #[test]
  fn derived_name_is_prefixed() {
    assert_eq!(
      derived_name("photo_20240102-153045.jpg"),
      "resized_photo_20240102-153045.jpg"
    );
  }
}
