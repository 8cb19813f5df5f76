//! Parallel fingerprint computation.
//!
//! The record list is split into contiguous buckets of
//! `max(1, n / (cores - 1))` records and one worker thread is started per
//! bucket; there is no work stealing and no cancellation. Each worker owns
//! its bucket exclusively and consults the shared cache before decoding
//! anything, so a warm cache run never touches the image decoder.
//!
//! For a given record the average hash is published to the cache before the
//! perceptual hash. A decode failure (or a decoder panic) marks the record
//! invalid in both the record and the cache; the rest of the bucket
//! continues.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Mutex;
use std::thread;

use image::DynamicImage;
use indicatif::ProgressBar;

use super::{FileRecord, ImageHasher};
use crate::cache::Cache;

/// Fill in missing fingerprints for every non-invalid record.
///
/// Blocks until all workers have joined. `progress`, when given, is
/// advanced once per processed record.
pub fn compute_fingerprints(
    records: &mut [FileRecord],
    cache: &Mutex<Cache>,
    progress: Option<&ProgressBar>,
) {
    if records.is_empty() {
        return;
    }

    let cores = thread::available_parallelism().map_or(1, |n| n.get());
    let bucket_size = (records.len() / cores.saturating_sub(1).max(1)).max(1);

    thread::scope(|scope| {
        for bucket in records.chunks_mut(bucket_size) {
            scope.spawn(move || {
                let hasher = ImageHasher::new();
                for record in bucket {
                    fingerprint_record(record, &hasher, cache);
                    if let Some(bar) = progress {
                        bar.inc(1);
                    }
                }
            });
        }
    });
}

/// Run the cache-first fingerprint procedure for one record.
fn fingerprint_record(record: &mut FileRecord, hasher: &ImageHasher, cache: &Mutex<Cache>) {
    let key = record.cache_key();

    let (cached_average, known_invalid) = {
        let cache = cache.lock().expect("cache lock poisoned");
        (cache.get_average_hash(&key), cache.is_invalid(&key))
    };
    if known_invalid {
        record.invalid = true;
        return;
    }

    // decoded at most once; reused for the perceptual hash when possible
    let mut decoded: Option<DynamicImage> = None;

    match cached_average {
        Some(fingerprint) => record.average_hash = Some(fingerprint),
        None => match decode_image(&record.path) {
            Some(image) => {
                let fingerprint = hasher.average_hash(&image);
                cache
                    .lock()
                    .expect("cache lock poisoned")
                    .put_average_hash(&key, &fingerprint);
                record.average_hash = Some(fingerprint);
                decoded = Some(image);
            }
            None => {
                mark_invalid(record, &key, cache);
                return;
            }
        },
    }

    let cached_perceptual = cache
        .lock()
        .expect("cache lock poisoned")
        .get_perceptual_hash(&key);
    match cached_perceptual {
        Some(fingerprint) => record.perceptual_hash = Some(fingerprint),
        None => {
            let image = match decoded {
                Some(image) => Some(image),
                None => decode_image(&record.path),
            };
            match image {
                Some(image) => {
                    let fingerprint = hasher.perceptual_hash(&image);
                    cache
                        .lock()
                        .expect("cache lock poisoned")
                        .put_perceptual_hash(&key, &fingerprint);
                    record.perceptual_hash = Some(fingerprint);
                }
                None => mark_invalid(record, &key, cache),
            }
        }
    }
}

fn mark_invalid(record: &mut FileRecord, key: &str, cache: &Mutex<Cache>) {
    log::debug!("Not a decodable image: {}", record.path.display());
    record.invalid = true;
    cache
        .lock()
        .expect("cache lock poisoned")
        .put_invalid(key, true);
}

/// Decode an image from disk. Decode errors and decoder panics are both
/// treated as "not an image".
fn decode_image(path: &Path) -> Option<DynamicImage> {
    match panic::catch_unwind(AssertUnwindSafe(|| image::open(path))) {
        Ok(Ok(image)) => Some(image),
        Ok(Err(e)) => {
            log::debug!("Failed to decode {}: {e}", path.display());
            None
        }
        Err(_) => {
            log::warn!("Image decoder panicked on {}", path.display());
            None
        }
    }
}
