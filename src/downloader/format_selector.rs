// FormatSelector - progressive format filtering and ranking
//
// Turns the raw yt-dlp format list into the rows the user picks from:
// - Only MP4 formats carrying both video and audio (no merge step needed)
// - Default pick: 720p if present, otherwise the tallest format
// - Size estimation from exact size, approximate size or bitrate

use serde::Serialize;

use super::humanize::format_bytes_human;
use super::models::FormatDescriptor;

/// Height picked outright whenever a format has it
pub const PREFERRED_HEIGHT: u32 = 720;

/// Size estimate for one format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeEstimate {
    pub bytes: Option<u64>,
    /// Estimated rather than reported by the server
    pub approximate: bool,
}

impl SizeEstimate {
    pub fn human(&self) -> String {
        format_bytes_human(self.bytes, self.approximate)
    }
}

/// One row of the format table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatRow {
    pub format_id: String,
    /// e.g. "1280x720", "720p" or "?"
    pub resolution: String,
    pub height: u32,
    pub size: SizeEstimate,
    /// Rendered size, replaced by the exact on-disk size after a download
    pub size_text: String,
}

/// Format selector for the progressive download path
pub struct FormatSelector;

impl FormatSelector {
    /// Keep MP4 formats with both a video and an audio stream, in input order
    pub fn filter_combined(formats: &[FormatDescriptor]) -> Vec<FormatDescriptor> {
        formats
            .iter()
            .filter(|f| f.is_mp4() && !f.is_storyboard() && f.has_video() && f.has_audio())
            .cloned()
            .collect()
    }

    /// Pick the default row.
    ///
    /// The first 720p entry wins outright. Otherwise the first entry of the
    /// greatest height wins. Entries without a height are never picked.
    pub fn auto_pick(filtered: &[FormatDescriptor]) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut best_height = 0;

        for (index, format) in filtered.iter().enumerate() {
            let height = format.height.unwrap_or(0);
            if height == PREFERRED_HEIGHT {
                return Some(index);
            }
            if height > best_height {
                best_height = height;
                best = Some(index);
            }
        }

        best
    }

    /// Estimate the download size of a format.
    ///
    /// Precedence: exact size, yt-dlp's approximate size, then bitrate times
    /// duration. Bitrates are kbps, so bytes = kbps * 1000 / 8 * seconds.
    pub fn estimate_size(format: &FormatDescriptor, duration_seconds: Option<f64>) -> SizeEstimate {
        if let Some(bytes) = format.filesize_bytes.filter(|b| *b > 0) {
            return SizeEstimate {
                bytes: Some(bytes),
                approximate: false,
            };
        }

        if let Some(bytes) = format.filesize_approx_bytes.filter(|b| *b > 0) {
            return SizeEstimate {
                bytes: Some(bytes),
                approximate: true,
            };
        }

        let bitrate = format
            .bitrate_total
            .filter(|t| *t > 0.0)
            .or_else(|| match (format.bitrate_video, format.bitrate_audio) {
                (Some(v), Some(a)) if v > 0.0 && a > 0.0 => Some(v + a),
                _ => None,
            });

        let bytes = match (bitrate, duration_seconds.filter(|d| *d > 0.0)) {
            (Some(kbps), Some(seconds)) => Some((kbps * 1000.0 / 8.0 * seconds) as u64),
            _ => None,
        };

        SizeEstimate {
            bytes,
            approximate: true,
        }
    }

    /// Display label for the resolution column
    pub fn resolution_label(format: &FormatDescriptor) -> String {
        match (format.width, format.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => format!("{}x{}", w, h),
            (_, Some(h)) if h > 0 => format!("{}p", h),
            _ => "?".to_string(),
        }
    }

    /// Build table rows for already-filtered formats
    pub fn build_rows(filtered: &[FormatDescriptor], duration_seconds: Option<f64>) -> Vec<FormatRow> {
        filtered
            .iter()
            .map(|format| {
                let size = Self::estimate_size(format, duration_seconds);
                FormatRow {
                    format_id: format.format_id.clone(),
                    resolution: Self::resolution_label(format),
                    height: format.height.unwrap_or(0),
                    size,
                    size_text: size.human(),
                }
            })
            .collect()
    }
}
