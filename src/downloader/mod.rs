// Downloader module - format selection, the yt-dlp boundary and the tasks

pub mod diagnostics;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod humanize;
pub mod models;
pub mod tasks;
pub mod tools;
pub mod utils;

#[cfg(test)]
pub(crate) mod fake;

pub use errors::{DownloadError, ExtractionError, GuardViolation, ProbeError, SelectionError};
pub use extractors::{MediaExtractor, YtDlpCli};
pub use format_selector::{FormatRow, FormatSelector, SizeEstimate};
pub use models::{DownloadOptions, DownloadOutcome, FormatDescriptor, MediaMetadata};
pub use tasks::{DownloadEvent, DownloadJob, ProbeEvent, TaskEvent};
