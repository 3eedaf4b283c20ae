use image::DynamicImage;

mod util;

pub mod resize;

pub trait ImageModifier {
  /// `Ok(None)` leaves the image untouched.
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, Box<dyn std::error::Error>>;
}
