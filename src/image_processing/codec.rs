use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use super::ProcessingError;
use crate::image_modifier::resize::{resolve_dimensions, ResizeModifier};
use crate::image_modifier::ImageModifier;

/// Encoded output of a resize, ready to be written to storage.
#[derive(Debug)]
pub struct ResizedImage {
  pub data: Vec<u8>,
  pub width: u32,
  pub height: u32,
}

/// Format implied by the extension of `name`.
pub fn format_for_name(name: &str) -> Option<ImageFormat> {
  ImageFormat::from_path(name).ok()
}

pub fn decode(data: &[u8], format: ImageFormat) -> Result<DynamicImage, ProcessingError> {
  image::load_from_memory_with_format(data, format)
    .map_err(|e| ProcessingError::DecodeError(e.to_string()))
}

pub fn encode(
  img: &DynamicImage,
  format: ImageFormat,
  jpeg_quality: u8,
) -> Result<Vec<u8>, ProcessingError> {
  let mut out = Vec::new();

  let res = match format {
    // JPEG has no alpha channel
    ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
      .write_with_encoder(JpegEncoder::new_with_quality(&mut out, jpeg_quality)),
    ImageFormat::Gif | ImageFormat::Bmp => {
      DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut Cursor::new(&mut out), format)
    }
    _ => img.write_to(&mut Cursor::new(&mut out), format),
  };

  res.map_err(|e| ProcessingError::StoreError(format!("failed to encode {:?}: {}", format, e)))?;

  Ok(out)
}

/// Decodes a stored original, resizes it and encodes the result as `output`.
/// A resize whose derived side exceeds `max_dimension` is refused.
/// Blocking; run it off the async executor.
pub fn resize_and_encode(
  data: &[u8],
  source: ImageFormat,
  width: i64,
  height: i64,
  output: ImageFormat,
  jpeg_quality: u8,
  max_dimension: u32,
) -> Result<ResizedImage, ProcessingError> {
  let img = decode(data, source)?;

  let source_size = (img.width(), img.height());
  let target = resolve_dimensions(source_size.0, source_size.1, width, height);
  if target != source_size && (target.0 > max_dimension || target.1 > max_dimension) {
    return Err(ProcessingError::BadRequest(format!(
      "resized image would be {}x{}, at most {} pixels per side are allowed",
      target.0, target.1, max_dimension
    )));
  }

  let modifier = ResizeModifier::new(width, height);
  let resized = match modifier.apply(&img) {
    Ok(Some(resized)) => resized,
    Ok(None) => img,
    Err(e) => return Err(ProcessingError::DecodeError(e.to_string())),
  };

  let data = encode(&resized, output, jpeg_quality)?;

  Ok(ResizedImage {
    data,
    width: resized.width(),
    height: resized.height(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

  const MAX_DIMENSION: u32 = 10_000;

  fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    encode(&DynamicImage::ImageRgb8(img), ImageFormat::Jpeg, 90).unwrap()
  }

  #[test]
  fn format_comes_from_extension() {
    assert_eq!(format_for_name("resized_a_1.jpg"), Some(ImageFormat::Jpeg));
    assert_eq!(format_for_name("resized_a_1.jpeg"), Some(ImageFormat::Jpeg));
    assert_eq!(format_for_name("resized_a_1.gif"), Some(ImageFormat::Gif));
    assert_eq!(format_for_name("resized_a_1"), None);
  }

  #[test]
  fn garbage_fails_to_decode() {
    assert!(matches!(
      decode(b"\x89PNG\r\n\x1a\nnot really", ImageFormat::Png),
      Err(ProcessingError::DecodeError(_))
    ));
  }

  #[test]
  fn width_only_keeps_aspect_ratio() {
    let out = resize_and_encode(&jpeg(800, 600), ImageFormat::Jpeg, 400, 0, ImageFormat::Jpeg, 85, MAX_DIMENSION)
      .unwrap();
    assert_eq!((out.width, out.height), (400, 300));

    let decoded = image::load_from_memory(&out.data).unwrap();
    assert_eq!(decoded.dimensions(), (400, 300));
  }

  #[test]
  fn no_dimensions_is_identity() {
    let out = resize_and_encode(&jpeg(37, 21), ImageFormat::Jpeg, 0, 0, ImageFormat::Jpeg, 85, MAX_DIMENSION)
      .unwrap();
    assert_eq!((out.width, out.height), (37, 21));
  }

  #[test]
  fn transparent_png_can_become_jpeg_gif_and_bmp() {
    let img = RgbaImage::from_pixel(10, 10, Rgba([10, 20, 30, 100]));
    let png = encode(&DynamicImage::ImageRgba8(img), ImageFormat::Png, 85).unwrap();

    for output in [ImageFormat::Jpeg, ImageFormat::Gif, ImageFormat::Bmp, ImageFormat::Png] {
      let out = resize_and_encode(&png, ImageFormat::Png, 5, 7, output, 85, MAX_DIMENSION).unwrap();
      let decoded = image::load_from_memory_with_format(&out.data, output).unwrap();
      assert_eq!(decoded.dimensions(), (5, 7), "{:?}", output);
    }
  }

  #[test]
  fn derived_side_over_the_limit_is_refused() {
    // 10x1000 asked for width 200 would need a height of 20000
    let tall = jpeg(10, 1000);

    assert!(matches!(
      resize_and_encode(&tall, ImageFormat::Jpeg, 200, 0, ImageFormat::Jpeg, 85, MAX_DIMENSION),
      Err(ProcessingError::BadRequest(_))
    ));

    let out = resize_and_encode(&tall, ImageFormat::Jpeg, 5, 0, ImageFormat::Jpeg, 85, MAX_DIMENSION)
      .unwrap();
    assert_eq!((out.width, out.height), (5, 500));
  }

  #[test]
  fn originals_above_the_limit_pass_through_untouched() {
    let out = resize_and_encode(&jpeg(40, 20), ImageFormat::Jpeg, 0, 0, ImageFormat::Png, 85, 16).unwrap();
    assert_eq!((out.width, out.height), (40, 20));
  }
}
