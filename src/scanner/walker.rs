//! Per-root directory enumeration.
//!
//! Walks each command-line root with [`jwalk`], turning every regular file
//! that passes the size window into a [`FileRecord`] tagged with the root's
//! command-line index and its depth below that root. Children are sorted
//! within each directory so a single root always enumerates in a stable
//! order; cross-root ordering is the command-line order.
//!
//! Errors while reading metadata are logged and the entry skipped; a root
//! that cannot be read at all simply contributes no records.

use std::fs::Metadata;
use std::path::Path;

use jwalk::WalkDir;

use super::FileRecord;

/// Directory enumerator for candidate discovery.
#[derive(Debug, Clone)]
pub struct Enumerator {
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,
    /// Smallest file size accepted, inclusive.
    pub minimum_file_size: u64,
    /// Largest file size accepted, exclusive.
    pub maximum_file_size: u64,
}

impl Enumerator {
    /// Create an enumerator with the given size window.
    #[must_use]
    pub fn new(follow_symlinks: bool, minimum_file_size: u64, maximum_file_size: u64) -> Self {
        Self {
            follow_symlinks,
            minimum_file_size,
            maximum_file_size,
        }
    }

    /// Walk `root` and append one record per accepted file to `records`.
    ///
    /// Returns the number of records appended. `cmdline_index` tags each
    /// record with the position of this root on the command line.
    pub fn scan_root(
        &self,
        root: &Path,
        cmdline_index: usize,
        records: &mut Vec<FileRecord>,
    ) -> usize {
        let before = records.len();

        let walk = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .skip_hidden(false)
            .process_read_dir(|_depth, _path, _state, children| {
                // sort children for a stable per-directory order
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        for entry_result in walk {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Walker error under {}: {e}", root.display());
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            if file_type.is_symlink() && !self.follow_symlinks {
                log::trace!("Skipping symlink: {}", entry.path().display());
                continue;
            }

            let path = entry.path();
            let metadata = if self.follow_symlinks {
                std::fs::metadata(&path)
            } else {
                std::fs::symlink_metadata(&path)
            };
            let metadata = match metadata {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("Failed to read file info from {}: {e}", path.display());
                    continue;
                }
            };

            if !metadata.is_file() {
                continue;
            }

            let size = metadata.len();
            if size < self.minimum_file_size || size >= self.maximum_file_size {
                log::trace!("Skipping file due to size ({size}): {}", path.display());
                continue;
            }

            let (device, inode) = file_identity(&metadata);
            records.push(FileRecord::new(
                path,
                size,
                device,
                inode,
                cmdline_index,
                entry.depth,
            ));
        }

        records.len() - before
    }
}

/// Assign each record a unique identity, starting at 1 in list order.
///
/// The identity is the final ranking tie-break, so this must run after all
/// roots are enumerated (and after any deterministic tail sorting).
pub fn mark_items(records: &mut [FileRecord]) {
    for (index, record) in records.iter_mut().enumerate() {
        record.identity = index as u64 + 1;
    }
}

/// Sort the records appended by the most recent root by `(depth, path)`.
///
/// Used with `--deterministic` so the clustering input does not depend on
/// filesystem listing order.
pub fn sort_tail_by_depth_and_path(records: &mut [FileRecord], first: usize) {
    debug_assert!(first <= records.len());
    records[first..].sort_by(|a, b| (a.depth, &a.path).cmp(&(b.depth, &b.path)));
}

#[cfg(unix)]
fn file_identity(metadata: &Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (metadata.dev(), metadata.ino())
}

#[cfg(not(unix))]
fn file_identity(_metadata: &Metadata) -> (u64, u64) {
    // no stable file identity available; identical-inode removal degrades
    // to a no-op because every record gets the same key with identity 0
    (0, 0)
}
