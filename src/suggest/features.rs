//! Colour-histogram feature extraction for the destination classifier.
//!
//! Each image becomes a vector of 1,331 floats: every RGB channel is
//! quantised from `[0, 255]` to `[0, 10]` and the vector counts how many
//! pixels fall into each of the 11^3 quantised colour cells, emitted in
//! lexicographic `(r, g, b)` order.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use image::RgbImage;

/// Quantisation levels per channel.
const LEVELS: usize = 11;

/// Length of every feature vector: 11^3 colour cells.
pub const FEATURE_LEN: usize = LEVELS * LEVELS * LEVELS;

/// Quantise one channel value from `[0, 255]` to `[0, 10]`.
#[inline]
fn quantise(value: u8) -> usize {
    value as usize * 100 / 2550
}

/// Compute the colour-histogram feature vector of a decoded image.
#[must_use]
pub fn colour_histogram(image: &RgbImage) -> Vec<f32> {
    let mut histogram = vec![0.0f32; FEATURE_LEN];
    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        let cell = (quantise(r) * LEVELS + quantise(g)) * LEVELS + quantise(b);
        histogram[cell] += 1.0;
    }
    histogram
}

/// Decode `path` in colour and featurise it.
///
/// Returns `None` when the file cannot be decoded; callers skip such
/// images.
#[must_use]
pub fn featurise(path: &Path) -> Option<Vec<f32>> {
    let image = match panic::catch_unwind(AssertUnwindSafe(|| image::open(path))) {
        Ok(Ok(image)) => image,
        Ok(Err(e)) => {
            log::debug!("Failed to decode {} for featurisation: {e}", path.display());
            return None;
        }
        Err(_) => {
            log::warn!("Image decoder panicked on {}", path.display());
            return None;
        }
    };
    Some(colour_histogram(&image.to_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    #[test]
    fn test_quantise_range_ends() {
        assert_eq!(quantise(0), 0);
        assert_eq!(quantise(255), 10);
    }

    #[test]
    fn test_quantise_is_monotone_and_bounded() {
        let mut last = 0;
        for v in 0..=255u8 {
            let q = quantise(v);
            assert!(q <= 10);
            assert!(q >= last);
            last = q;
        }
    }

    #[test]
    fn test_histogram_length() {
        let image = RgbImage::new(5, 4);
        assert_eq!(colour_histogram(&image).len(), FEATURE_LEN);
    }

    #[test]
    fn test_histogram_counts_every_pixel() {
        let image = RgbImage::from_pixel(6, 7, Rgb([255, 0, 128]));
        let histogram = colour_histogram(&image);
        let total: f32 = histogram.iter().sum();
        assert_eq!(total, 42.0);

        // all pixels share one cell: r=10, g=0, b=128*100/2550=5
        let cell = (10 * LEVELS + 0) * LEVELS + 5;
        assert_eq!(histogram[cell], 42.0);
        assert_eq!(histogram.iter().filter(|&&c| c != 0.0).count(), 1);
    }

    #[test]
    fn test_histogram_distinguishes_pixels() {
        let mut image = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        image.put_pixel(1, 0, Rgb([255, 255, 255]));
        let histogram = colour_histogram(&image);
        assert_eq!(histogram[0], 1.0);
        assert_eq!(histogram[FEATURE_LEN - 1], 1.0);
    }

    #[test]
    fn test_featurise_real_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img.png");
        RgbImage::from_pixel(8, 8, Rgb([40, 80, 120]))
            .save(&path)
            .unwrap();

        let features = featurise(&path).unwrap();
        assert_eq!(features.len(), FEATURE_LEN);
        assert_eq!(features.iter().sum::<f32>(), 64.0);
    }

    #[test]
    fn test_featurise_undecodable_returns_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(featurise(&path).is_none());
    }
}
