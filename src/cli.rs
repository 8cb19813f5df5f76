//! Command-line interface definitions for imgdupe.
//!
//! All options are defined with the clap derive API. Boolean options take an
//! explicit value (`--ignore-empty false`) so that defaults remain visible
//! and scripts can always pass both polarities.
//!
//! # Example
//!
//! ```bash
//! # Scan two trees, earlier roots rank higher
//! imgdupe ~/Pictures ~/Downloads
//!
//! # Keep a hash cache between runs
//! imgdupe --cache-name ~/.imgdupe-cache.json ~/Pictures
//!
//! # Suggest a destination directory per cluster from a sorted reference tree
//! imgdupe --cluster-path ~/Pictures/sorted ~/Downloads
//! ```

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Near-duplicate image finder.
///
/// Finds visually similar images recursively in the given ROOTs
/// (directories or files), groups them into clusters and writes a results
/// file. Roots listed first are ranked higher: when the same inode is
/// reachable from several roots, the occurrence under the earliest root is
/// the one that is kept.
#[derive(Debug, Parser)]
#[command(name = "imgdupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Ignore empty files (true implies --min-size 1, false implies --min-size 0)
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    pub ignore_empty: bool,

    /// Ignore files smaller than N bytes
    #[arg(long, value_name = "N", help_heading = "Filtering Options")]
    pub min_size: Option<u64>,

    /// Ignore files of N bytes and larger (0 disables this check)
    #[arg(long, value_name = "N", default_value_t = 0, help_heading = "Filtering Options")]
    pub max_size: u64,

    /// Follow symbolic links during traversal
    #[arg(long, value_name = "BOOL", default_value_t = false, action = ArgAction::Set)]
    pub follow_symlinks: bool,

    /// Keep only one of a set of files sharing device and inode
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    pub remove_ident_inode: bool,

    /// Make results independent of filesystem listing order
    #[arg(long, value_name = "BOOL", default_value_t = false, action = ArgAction::Set)]
    pub deterministic: bool,

    /// Name of the results file
    #[arg(
        long,
        value_name = "PATH",
        default_value = "rdfind_results.txt",
        help_heading = "Output Options"
    )]
    pub output_name: PathBuf,

    /// Persistent hash cache file (disabled when not given)
    #[arg(long, value_name = "PATH")]
    pub cache_name: Option<PathBuf>,

    /// Reference tree used to suggest a destination directory per cluster
    #[arg(long, value_name = "PATH")]
    pub cluster_path: Option<PathBuf>,

    /// Skip reference directories whose path starts with this prefix
    #[arg(long, value_name = "PREFIX", requires = "cluster_path")]
    pub cluster_exclude: Option<String>,

    /// Directories or files to scan
    #[arg(value_name = "ROOT", num_args = 1.., required = true)]
    pub roots: Vec<PathBuf>,
}
