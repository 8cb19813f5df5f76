//! Output module: results-file writing.

pub mod report;

pub use report::{render_report, write_report, ReportError};
