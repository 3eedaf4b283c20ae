/// Scales `side` by `numerator / denominator`, rounded, never below one pixel.
pub fn scale_side(side: u32, numerator: u32, denominator: u32) -> u32 {
  if denominator == 0 {
    return side.max(1);
  }

  let scaled = (side as f64 * numerator as f64 / denominator as f64).round();
  scaled.clamp(1.0, u32::MAX as f64) as u32
}
