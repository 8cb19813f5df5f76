//! Persistent fingerprint cache.
//!
//! The cache maps a file path to its previously computed fingerprints and
//! an invalid-image flag, so a second run never decodes an unchanged image
//! again. On disk it is a single JSON object:
//!
//! ```json
//! {
//!   "/pics/a.jpg": { "aHash": [12, 0, 255, ...], "pHash": [3, 77, ...] },
//!   "/pics/broken.png": { "isInvalidImage": true }
//! }
//! ```
//!
//! Loading is lossy by design: a missing or unreadable file yields an empty
//! cache, and an entry that fails to parse is skipped while the rest of the
//! file is kept. Saving replaces the file atomically and fails soft.
//!
//! During hashing the cache is shared read-write across all workers behind
//! a single `Mutex`; fingerprint computation dominates, so lock contention
//! is irrelevant.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scanner::{Fingerprint, FingerprintKind};

/// Errors produced while saving the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache file could not be written or renamed into place.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The in-memory map could not be serialised.
    #[error("serialisation error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One cached file: fingerprints plus the invalid-image flag.
///
/// Absent fields mean "not yet computed". When `invalid` is set, the hashes
/// for this path must never be recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Average-hash bytes.
    #[serde(rename = "aHash", default, skip_serializing_if = "Option::is_none")]
    pub a_hash: Option<Vec<u8>>,
    /// Perceptual-hash bytes.
    #[serde(rename = "pHash", default, skip_serializing_if = "Option::is_none")]
    pub p_hash: Option<Vec<u8>>,
    /// The file could not be decoded as an image.
    #[serde(
        rename = "isInvalidImage",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub invalid: bool,
}

impl CacheEntry {
    /// True when every field is absent or false; such entries are not
    /// written back to disk.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        self.a_hash.is_none() && self.p_hash.is_none() && !self.invalid
    }
}

/// Path-keyed fingerprint cache.
#[derive(Debug, Default)]
pub struct Cache {
    path: Option<PathBuf>,
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// An in-memory cache that is never persisted.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Load the cache from `path`, remembering it for [`Cache::save`].
    ///
    /// A missing or unparseable file is logged and treated as empty; an
    /// entry of the wrong shape is logged and skipped.
    #[must_use]
    pub fn load(path: PathBuf) -> Self {
        let mut entries = HashMap::new();

        match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(
                &text,
            ) {
                Ok(raw) => {
                    for (key, value) in raw {
                        match serde_json::from_value::<CacheEntry>(value) {
                            Ok(entry) => {
                                entries.insert(key, entry);
                            }
                            Err(e) => {
                                log::warn!("Skipping malformed cache entry for {key}: {e}");
                            }
                        }
                    }
                    log::info!("Loaded {} records from cache", entries.len());
                }
                Err(e) => {
                    log::warn!("Couldn't parse cache file {}: {e}", path.display());
                }
            },
            Err(e) => {
                log::warn!("Couldn't read cache file {}: {e}", path.display());
            }
        }

        Self {
            path: Some(path),
            entries,
        }
    }

    /// Stored average hash for `key`, if any.
    #[must_use]
    pub fn get_average_hash(&self, key: &str) -> Option<Fingerprint> {
        self.entries
            .get(key)
            .and_then(|e| e.a_hash.clone())
            .map(|bytes| Fingerprint::new(FingerprintKind::Average, bytes))
    }

    /// Stored perceptual hash for `key`, if any.
    #[must_use]
    pub fn get_perceptual_hash(&self, key: &str) -> Option<Fingerprint> {
        self.entries
            .get(key)
            .and_then(|e| e.p_hash.clone())
            .map(|bytes| Fingerprint::new(FingerprintKind::Perceptual, bytes))
    }

    /// Whether `key` is marked as an invalid image.
    #[must_use]
    pub fn is_invalid(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|e| e.invalid)
    }

    /// Insert or overwrite the average hash for `key`.
    pub fn put_average_hash(&mut self, key: &str, fingerprint: &Fingerprint) {
        self.entry_mut(key).a_hash = Some(fingerprint.as_bytes().to_vec());
    }

    /// Insert or overwrite the perceptual hash for `key`.
    pub fn put_perceptual_hash(&mut self, key: &str, fingerprint: &Fingerprint) {
        self.entry_mut(key).p_hash = Some(fingerprint.as_bytes().to_vec());
    }

    /// Insert or overwrite the invalid-image flag for `key`.
    pub fn put_invalid(&mut self, key: &str, invalid: bool) {
        self.entry_mut(key).invalid = invalid;
    }

    fn entry_mut(&mut self, key: &str) -> &mut CacheEntry {
        self.entries.entry(key.to_owned()).or_default()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache back to its file, replacing it atomically.
    ///
    /// Vacant entries are dropped. A no-op when the cache was constructed
    /// with [`Cache::disabled`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the file cannot be written; callers are
    /// expected to log and continue.
    pub fn save(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let populated: HashMap<&String, &CacheEntry> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_vacant())
            .collect();
        let json = serde_json::to_string(&populated)?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;

        log::debug!("Saved {} records to cache", populated.len());
        Ok(())
    }
}
