// MediaExtractor trait and the request/event types crossing it

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::OutputDirs;
use crate::downloader::errors::ExtractionError;
use crate::downloader::models::MediaMetadata;

/// Format expression for the audio step
pub const AUDIO_FORMAT: &str = "bestaudio/best";
/// Codec the audio step transcodes to
pub const AUDIO_CODEC: &str = "mp3";
/// Target audio bitrate in kbps
pub const AUDIO_QUALITY_KBPS: u32 = 192;
/// Container the video step merges into
pub const MERGE_CONTAINER: &str = "mp4";

/// What to fetch and where to put it
#[derive(Debug, Clone, PartialEq)]
pub enum FetchKind {
    /// One specific format, merged into mp4 when needed
    Video { format_id: String },
    /// Best audio, transcoded to MP3
    Audio,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub kind: FetchKind,
    /// yt-dlp output template (directory + `%(title)s.%(ext)s`)
    pub output_template: String,
}

impl FetchRequest {
    pub fn video(url: impl Into<String>, format_id: impl Into<String>, dirs: &OutputDirs) -> Self {
        Self {
            url: url.into(),
            kind: FetchKind::Video {
                format_id: format_id.into(),
            },
            output_template: dirs.video_template(),
        }
    }

    pub fn audio(url: impl Into<String>, dirs: &OutputDirs) -> Self {
        Self {
            url: url.into(),
            kind: FetchKind::Audio,
            output_template: dirs.audio_template(),
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind, FetchKind::Audio)
    }
}

/// Progress reported while a fetch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchEvent {
    /// Bytes so far; `total` is exact or estimated, `None` when unknown
    Downloading { downloaded: u64, total: Option<u64> },
    /// yt-dlp finished transferring the current file
    Finished,
}

impl FetchEvent {
    /// Whole-number percentage, clamped to 0..=100.
    /// Unknown totals report 0.
    pub fn percent(&self) -> u8 {
        match *self {
            FetchEvent::Finished => 100,
            FetchEvent::Downloading { total: None, .. } | FetchEvent::Downloading { total: Some(0), .. } => 0,
            FetchEvent::Downloading { downloaded, total: Some(total) } => {
                (downloaded.saturating_mul(100) / total).min(100) as u8
            }
        }
    }
}

/// Files a fetch produced, as reported by yt-dlp after its final move
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutput {
    pub files: Vec<PathBuf>,
}

impl FetchOutput {
    /// Last file reported; for a merge or a transcode that is the final one
    pub fn primary(&self) -> Option<&PathBuf> {
        self.files.last()
    }
}

/// The extraction library boundary
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Fetch metadata and the format list without downloading
    async fn probe(&self, url: &str) -> Result<MediaMetadata, ExtractionError>;

    /// Download according to `request`, reporting progress through `hook`
    /// from the task running the fetch
    async fn fetch(
        &self,
        request: &FetchRequest,
        hook: &(dyn Fn(FetchEvent) + Send + Sync),
    ) -> Result<FetchOutput, ExtractionError>;

    /// Whether the post-processor needed for audio transcoding is present
    async fn post_processor_available(&self) -> bool;
}
