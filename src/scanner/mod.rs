//! Scanner module: file discovery and perceptual hashing.
//!
//! The scanner owns the first half of the pipeline:
//! - [`walker`]: per-root directory traversal producing [`FileRecord`]s
//! - [`fingerprint`]: aHash/pHash computation over decoded images
//! - [`pool`]: parallel fingerprint computation backed by the shared cache

pub mod fingerprint;
pub mod pool;
pub mod walker;

use std::path::PathBuf;

pub use fingerprint::{Fingerprint, FingerprintKind, ImageHasher};
pub use pool::compute_fingerprints;
pub use walker::{mark_items, sort_tail_by_depth_and_path, Enumerator};

/// Image suffixes accepted by the pipeline. Matching is case-sensitive.
pub const IMAGE_SUFFIXES: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// One candidate file discovered during enumeration.
///
/// Constructed by the [`Enumerator`]; fingerprints are filled in later by
/// the worker pool, which is the only writer while hashing runs. The
/// `identity` is a unique number assigned after all roots are walked and is
/// the final tie-break in ranking.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Path as composed during the walk.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Device id from stat.
    pub device: u64,
    /// Inode number from stat.
    pub inode: u64,
    /// Index of the command-line root this file was found under.
    pub cmdline_index: usize,
    /// Directory depth below the root.
    pub depth: usize,
    /// Unique number assigned in enumeration order, starting at 1.
    pub identity: u64,
    /// Set when the file could not be decoded as an image.
    pub invalid: bool,
    /// Average-hash fingerprint, filled by the worker pool.
    pub average_hash: Option<Fingerprint>,
    /// Perceptual-hash fingerprint, filled by the worker pool.
    pub perceptual_hash: Option<Fingerprint>,
}

impl FileRecord {
    /// Create a record for a file discovered under the given root index.
    #[must_use]
    pub fn new(
        path: PathBuf,
        size: u64,
        device: u64,
        inode: u64,
        cmdline_index: usize,
        depth: usize,
    ) -> Self {
        Self {
            path,
            size,
            device,
            inode,
            cmdline_index,
            depth,
            identity: 0,
            invalid: false,
            average_hash: None,
            perceptual_hash: None,
        }
    }

    /// Ranking key: the lexicographically smallest record of an
    /// identical-inode group is the one that is kept.
    #[must_use]
    pub fn rank(&self) -> (usize, usize, u64) {
        (self.cmdline_index, self.depth, self.identity)
    }

    /// Filesystem identity of this file.
    #[must_use]
    pub fn inode_key(&self) -> (u64, u64) {
        (self.device, self.inode)
    }

    /// True when the path carries one of the accepted image suffixes.
    /// The comparison is case-sensitive, so `photo.JPG` is not an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        let name = self.path.to_string_lossy();
        IMAGE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
    }

    /// Key used for this record in the hash cache.
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}
