use image::imageops::FilterType;
use image::DynamicImage;

use super::ImageModifier;
use crate::image_modifier::util;

/// Resizes to the requested width/height. A value of zero or below leaves
/// that side unset; it is then derived from the source aspect ratio.
pub struct ResizeModifier {
  width: i64,
  height: i64,
}

impl ResizeModifier {
  pub fn new(width: i64, height: i64) -> ResizeModifier {
    ResizeModifier { width, height }
  }
}

/// Final output dimensions for a `source_width` x `source_height` image.
pub fn resolve_dimensions(source_width: u32, source_height: u32, width: i64, height: i64) -> (u32, u32) {
  let width = clamp_side(width);
  let height = clamp_side(height);

  match (width, height) {
    (0, 0) => (source_width, source_height),
    (0, h) => (util::scale_side(h, source_width, source_height), h),
    (w, 0) => (w, util::scale_side(w, source_height, source_width)),
    (w, h) => (w, h),
  }
}

fn clamp_side(side: i64) -> u32 {
  side.clamp(0, u32::MAX as i64) as u32
}

impl ImageModifier for ResizeModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, Box<dyn std::error::Error>> {
    let source = (img.width(), img.height());
    let target = resolve_dimensions(source.0, source.1, self.width, self.height);

    if target == source {
      return Ok(None);
    }

    Ok(Some(img.resize_exact(target.0, target.1, FilterType::Lanczos3)))
  }
}
