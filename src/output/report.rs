//! Results-file writer.
//!
//! One block per multi-member cluster, in the order the caller sorted them:
//!
//! ```text
//! # Section (size:3, distance:2)
//! 0:52013 /pics/a.jpg
//! 1:51990 /backup/a.jpg
//! 2:18100 /thumbs/a.jpg
//! ```
//!
//! `size` is the member count and `distance` the cluster's worst accepted
//! distance; members are listed largest file first. When destination
//! suggestions were computed a `### Sorting ###` appendix follows with the
//! reference directories and one score block per candidate.
//!
//! An unwritable results file is an error for the caller to log; nothing is
//! partially written in that case beyond what the OS already flushed.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cluster::Cluster;
use crate::suggest::Suggestions;

/// Errors produced while writing the results file.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The results file could not be created or written.
    #[error("could not write results file {path}: {source}")]
    Io {
        /// Path of the results file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Write the report to `path`.
///
/// # Errors
///
/// Returns [`ReportError`] when the file cannot be created or written;
/// callers log the error and continue the run.
pub fn write_report(
    path: &Path,
    clusters: &[Cluster],
    suggestions: Option<&Suggestions>,
) -> Result<(), ReportError> {
    let file = File::create(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    render_report(&mut writer, clusters, suggestions).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the report into any writer. Single-member clusters are skipped.
pub fn render_report<W: Write>(
    writer: &mut W,
    clusters: &[Cluster],
    suggestions: Option<&Suggestions>,
) -> io::Result<()> {
    for cluster in clusters {
        if cluster.is_single() {
            continue;
        }
        writeln!(
            writer,
            "# Section (size:{}, distance:{})",
            cluster.len(),
            cluster.distance()
        )?;
        for (index, member) in cluster.members_by_size_desc().iter().enumerate() {
            writeln!(
                writer,
                "{index}:{} {}",
                member.size,
                member.path.display()
            )?;
        }
    }

    if let Some(suggestions) = suggestions {
        writeln!(writer)?;
        writeln!(writer)?;
        writeln!(writer, "### Sorting ###")?;
        writeln!(writer)?;
        writeln!(writer, "Clusters:")?;
        for (index, name) in suggestions.cluster_names.iter().enumerate() {
            writeln!(writer, "{index}: {name}")?;
        }
        for row in &suggestions.rows {
            writeln!(writer)?;
            writeln!(writer, "{}", row.path.display())?;
            for (index, score) in row.scores.iter().enumerate() {
                writeln!(writer, "{index}: {score}")?;
            }
        }
    }

    Ok(())
}
