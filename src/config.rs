//! Runtime options derived from the command line.
//!
//! The CLI surface is a thin layer; this module turns parsed arguments into
//! a validated [`Options`] value the pipeline works from. Size bounds are
//! normalised here: `--max-size 0` expands to "unbounded" and
//! `--ignore-empty` sets the minimum-size floor unless `--min-size` was
//! given explicitly.

use std::path::PathBuf;
use thiserror::Error;

use crate::cli::Cli;

/// Errors produced while validating command-line options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The size window is empty or inverted.
    #[error("maximum file size {max} must be larger than minimum file size {min}")]
    InvalidSizeWindow {
        /// Effective minimum size in bytes
        min: u64,
        /// Effective maximum size in bytes
        max: u64,
    },
}

/// Validated runtime options for one invocation.
#[derive(Debug, Clone)]
pub struct Options {
    /// Smallest file size (bytes) to consider, inclusive.
    pub minimum_file_size: u64,
    /// Largest file size (bytes) to consider, exclusive. `u64::MAX` when unbounded.
    pub maximum_file_size: u64,
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,
    /// Collapse files sharing device and inode to the best-ranked one.
    pub remove_identical_inodes: bool,
    /// Sort each root's findings by (depth, path) for reproducible output.
    pub deterministic: bool,
    /// Results file path.
    pub output_name: PathBuf,
    /// Hash cache file; `None` disables caching.
    pub cache_name: Option<PathBuf>,
    /// Reference tree for destination suggestions; `None` disables them.
    pub cluster_path: Option<PathBuf>,
    /// Skip reference directories whose path starts with this prefix.
    pub cluster_exclude: Option<String>,
    /// Roots to scan, in ranking order.
    pub roots: Vec<PathBuf>,
}

impl Options {
    /// Build validated options from parsed CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSizeWindow`] when the effective minimum
    /// size is not strictly below the effective maximum.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let minimum_file_size = cli
            .min_size
            .unwrap_or(if cli.ignore_empty { 1 } else { 0 });
        let maximum_file_size = if cli.max_size == 0 {
            u64::MAX
        } else {
            cli.max_size
        };

        if minimum_file_size >= maximum_file_size {
            return Err(ConfigError::InvalidSizeWindow {
                min: minimum_file_size,
                max: maximum_file_size,
            });
        }

        Ok(Self {
            minimum_file_size,
            maximum_file_size,
            follow_symlinks: cli.follow_symlinks,
            remove_identical_inodes: cli.remove_ident_inode,
            deterministic: cli.deterministic,
            output_name: cli.output_name.clone(),
            cache_name: cli.cache_name.clone(),
            cluster_path: cli.cluster_path.clone(),
            cluster_exclude: cli.cluster_exclude.clone(),
            roots: cli.roots.clone(),
        })
    }
}
