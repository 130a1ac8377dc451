// Error types for the extractor boundary, the tasks and the session

use std::path::PathBuf;

use thiserror::Error;

use super::diagnostics::{diagnose, summarize, Diagnosis};

/// Failure talking to yt-dlp
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// yt-dlp binary missing
    #[error("{0} not found; install it or pass its path")]
    ToolNotFound(String),

    /// Process could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit; `summary` holds the lines worth showing
    #[error("{program} failed: {summary}")]
    Failed {
        program: String,
        code: Option<i32>,
        summary: String,
        stderr: String,
    },

    /// JSON output could not be parsed
    #[error("malformed yt-dlp output: {0}")]
    MalformedOutput(#[from] serde_json::Error),

    /// Output parsed but is not a single media item
    #[error("unexpected yt-dlp response: {0}")]
    UnexpectedResponse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// Build from a failed run's exit code and stderr
    pub fn from_stderr(program: impl Into<String>, code: Option<i32>, stderr: &str) -> Self {
        Self::Failed {
            program: program.into(),
            code,
            summary: summarize(stderr),
            stderr: stderr.to_string(),
        }
    }

    /// Classify the failure, when it came from yt-dlp itself
    pub fn diagnosis(&self) -> Option<Diagnosis> {
        match self {
            Self::Failed { stderr, .. } => diagnose(stderr),
            _ => None,
        }
    }

    /// yt-dlp could not run its post-processor (ffmpeg)
    pub fn is_post_processor_missing(&self) -> bool {
        self.diagnosis() == Some(Diagnosis::PostProcessorMissing)
    }

    /// Message for the status line, with a hint when one applies
    pub fn status_text(&self) -> String {
        match self.diagnosis().and_then(|d| d.hint().map(|h| (d, h))) {
            Some((diagnosis, hint)) => format!("{} ({}; {})", self, diagnosis.description(), hint),
            None => self.to_string(),
        }
    }
}

/// Probe (analysis) failure
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("analysis failed: {0}")]
    Extraction(#[from] ExtractionError),
}

impl ProbeError {
    pub fn status_text(&self) -> String {
        match self {
            Self::Extraction(e) => format!("analysis failed: {}", e.status_text()),
        }
    }
}

/// Selecting a row of the format table failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no formats to choose from; analyze a URL first")]
    NoFormats,

    #[error("row {index} does not exist (table has {len} rows)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("format {0} is not in the current list")]
    UnknownFormat(String),

    #[error("invalid format selected (empty format id)")]
    EmptyFormatId,
}

/// Download task failure.
///
/// A missing post-processor in the audio step is not an error.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("video download failed: {0}")]
    Video(#[source] ExtractionError),

    #[error("audio extraction failed: {0}")]
    Audio(#[source] ExtractionError),

    #[error("cannot prepare output directory: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    pub fn status_text(&self) -> String {
        match self {
            Self::Video(e) => format!("video download failed: {}", e.status_text()),
            Self::Audio(e) => format!("audio extraction failed: {}", e.status_text()),
            Self::Io(_) => self.to_string(),
        }
    }
}

/// An action was attempted in a state that forbids it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("missing URL")]
    EmptyUrl,

    #[error("an analysis is already running")]
    ProbeRunning,

    #[error("a download is already running")]
    DownloadRunning,

    #[error("select a format before downloading")]
    NoSelection,

    #[error("nothing to download: enable video or audio")]
    NothingRequested,
}

/// Output directory setup failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
