//! Perceptual fingerprints and their computation.
//!
//! Two hash kinds are used together: the average hash (mean luminance of an
//! 8x8 thumbnail) and the DCT-based perceptual hash. Both are 8-byte bit
//! vectors; the distance between two fingerprints of the same kind is the
//! Hamming distance over their bits, exposed as a non-negative `f64`.

use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};

/// The kind of perceptual hash a fingerprint was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintKind {
    /// Average hash: mean-luminance thumbnail hash.
    Average,
    /// Perceptual hash: frequency-domain (DCT) hash.
    Perceptual,
}

/// A fixed-width perceptual-hash bit vector tagged with its kind.
///
/// Distances are only defined between fingerprints of the same kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    kind: FingerprintKind,
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Wrap raw hash bytes.
    #[must_use]
    pub fn new(kind: FingerprintKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    /// The hash kind this fingerprint was produced by.
    #[must_use]
    pub fn kind(&self) -> FingerprintKind {
        self.kind
    }

    /// Raw hash bytes, as stored in the cache file.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hamming distance in bits between two fingerprints of the same kind.
    ///
    /// Lower is more similar; 0 means the hashes are identical.
    #[must_use]
    pub fn distance(&self, other: &Fingerprint) -> f64 {
        debug_assert_eq!(self.kind, other.kind, "cross-kind fingerprint distance");

        let common = self
            .bytes
            .iter()
            .zip(&other.bytes)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum::<u32>();

        // length mismatch can only happen across hash configurations;
        // count the unpaired tail as fully different
        let tail = self.bytes.len().abs_diff(other.bytes.len()) as u32 * 8;

        f64::from(common + tail)
    }
}

/// Computes both fingerprint kinds for decoded images.
///
/// Cheap to construct; the worker pool creates one per thread.
pub struct ImageHasher {
    average: Hasher,
    perceptual: Hasher,
}

impl ImageHasher {
    /// Create a hasher pair with the default 8x8 hash size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            average: HasherConfig::new().hash_alg(HashAlg::Mean).to_hasher(),
            perceptual: HasherConfig::new()
                .hash_alg(HashAlg::Median)
                .preproc_dct()
                .to_hasher(),
        }
    }

    /// Compute the average hash of a decoded image.
    #[must_use]
    pub fn average_hash(&self, image: &DynamicImage) -> Fingerprint {
        Fingerprint::new(
            FingerprintKind::Average,
            self.average.hash_image(image).as_bytes().to_vec(),
        )
    }

    /// Compute the DCT perceptual hash of a decoded image.
    #[must_use]
    pub fn perceptual_hash(&self, image: &DynamicImage) -> Fingerprint {
        Fingerprint::new(
            FingerprintKind::Perceptual,
            self.perceptual.hash_image(image).as_bytes().to_vec(),
        )
    }
}

impl Default for ImageHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn fp(kind: FingerprintKind, bytes: &[u8]) -> Fingerprint {
        Fingerprint::new(kind, bytes.to_vec())
    }

    #[test]
    fn test_distance_zero_for_identical() {
        let a = fp(FingerprintKind::Average, &[0xAB, 0xCD, 0x00, 0xFF]);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_distance_counts_differing_bits() {
        let a = fp(FingerprintKind::Perceptual, &[0b0000_0000, 0b1111_0000]);
        let b = fp(FingerprintKind::Perceptual, &[0b0000_0001, 0b1111_1111]);
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = fp(FingerprintKind::Average, &[1, 2, 3]);
        let b = fp(FingerprintKind::Average, &[3, 2, 1]);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn test_distance_length_mismatch_counts_tail() {
        let a = fp(FingerprintKind::Average, &[0x00]);
        let b = fp(FingerprintKind::Average, &[0x00, 0x00]);
        assert_eq!(a.distance(&b), 8.0);
    }

    #[test]
    fn test_hasher_identical_images_distance_zero() {
        let hasher = ImageHasher::new();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([120, 40, 200])));

        let a1 = hasher.average_hash(&img);
        let a2 = hasher.average_hash(&img);
        assert_eq!(a1.distance(&a2), 0.0);

        let p1 = hasher.perceptual_hash(&img);
        let p2 = hasher.perceptual_hash(&img);
        assert_eq!(p1.distance(&p2), 0.0);
    }

    #[test]
    fn test_hasher_produces_eight_byte_hashes() {
        let hasher = ImageHasher::new();
        let img = DynamicImage::ImageRgb8(RgbImage::new(16, 16));
        assert_eq!(hasher.average_hash(&img).as_bytes().len(), 8);
        assert_eq!(hasher.perceptual_hash(&img).as_bytes().len(), 8);
    }

    #[test]
    fn test_hasher_kinds() {
        let hasher = ImageHasher::new();
        let img = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        assert_eq!(hasher.average_hash(&img).kind(), FingerprintKind::Average);
        assert_eq!(
            hasher.perceptual_hash(&img).kind(),
            FingerprintKind::Perceptual
        );
    }
}
