// Common data models for the extractor boundary, the tasks and the session

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Sentinel yt-dlp uses for an absent codec
pub const NO_CODEC: &str = "none";

/// Prefix of storyboard (thumbnail sheet) format ids
pub const STORYBOARD_PREFIX: &str = "sb";

/// One downloadable variant of a media item, as reported by yt-dlp.
///
/// Only `format_id` matters for selection; every other field is informational.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Opaque identifier, handed back verbatim to the download step
    #[serde(default)]
    pub format_id: String,
    /// Container extension (mp4, webm, m4a, mhtml)
    #[serde(rename = "ext", default)]
    pub extension: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub height: Option<u32>,
    #[serde(rename = "fps", default)]
    pub frame_rate: Option<f64>,
    /// Video codec (avc1, vp9, av01, none)
    #[serde(rename = "vcodec", default)]
    pub video_codec: Option<String>,
    /// Audio codec (mp4a, opus, none)
    #[serde(rename = "acodec", default)]
    pub audio_codec: Option<String>,
    /// Exact size in bytes, when the server reports one
    #[serde(rename = "filesize", default, deserialize_with = "lenient_u64")]
    pub filesize_bytes: Option<u64>,
    /// Size estimated by yt-dlp itself
    #[serde(rename = "filesize_approx", default, deserialize_with = "lenient_u64")]
    pub filesize_approx_bytes: Option<u64>,
    /// Total bitrate in kbps
    #[serde(rename = "tbr", default)]
    pub bitrate_total: Option<f64>,
    /// Video bitrate in kbps
    #[serde(rename = "vbr", default)]
    pub bitrate_video: Option<f64>,
    /// Audio bitrate in kbps
    #[serde(rename = "abr", default)]
    pub bitrate_audio: Option<f64>,
    #[serde(default)]
    pub format_note: Option<String>,
}

impl FormatDescriptor {
    /// Check if the container is MP4
    pub fn is_mp4(&self) -> bool {
        self.extension.as_deref() == Some("mp4")
    }

    /// Check if this is a storyboard pseudo-format
    pub fn is_storyboard(&self) -> bool {
        self.format_id.starts_with(STORYBOARD_PREFIX)
    }

    pub fn has_video(&self) -> bool {
        codec_present(self.video_codec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        codec_present(self.audio_codec.as_deref())
    }
}

fn codec_present(codec: Option<&str>) -> bool {
    codec.map_or(false, |c| !c.is_empty() && c != NO_CODEC)
}

/// Result of a probe: title, duration and the ordered format list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "duration", default)]
    pub duration_seconds: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub formats: Vec<FormatDescriptor>,
}

/// Which steps a download task runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    pub want_video: bool,
    pub want_audio: bool,
}

impl DownloadOptions {
    pub fn video_only() -> Self {
        Self {
            want_video: true,
            want_audio: false,
        }
    }

    pub fn audio_only() -> Self {
        Self {
            want_video: false,
            want_audio: true,
        }
    }

    /// Nothing would be downloaded
    pub fn is_empty(&self) -> bool {
        !self.want_video && !self.want_audio
    }
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            want_video: true,
            want_audio: true,
        }
    }
}

/// What a successful download task produced.
///
/// Paths come from yt-dlp's own reporting and may be missing even on success.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub video_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
    /// The audio step was requested but the post-processor was unavailable
    pub audio_skipped: bool,
}

// yt-dlp reports sizes and dimensions as ints most of the time, floats sometimes
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_u64(deserializer)?.and_then(|v| u32::try_from(v).ok()))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<FormatDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<FormatDescriptor>>::deserialize(deserializer)?.unwrap_or_default())
}
