// yt-dlp failure diagnostics
//
// Classifies stderr text so status messages can say what went wrong and what
// the user can try, and so the audio step can recognise a missing ffmpeg.

use serde::{Deserialize, Serialize};

/// Why a yt-dlp run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnosis {
    /// ffmpeg/ffprobe missing, so post-processing (merge, MP3) cannot run
    PostProcessorMissing,
    /// DRM-protected or paid content
    DrmProtected,
    /// Video removed, private or otherwise gone
    Unavailable,
    AgeRestricted,
    GeoBlocked,
    /// 429 or explicit rate limiting
    RateLimited,
    /// Bot check, captcha, 403
    Blocked,
    /// The chosen format id is not offered any more
    FormatUnavailable,
    UnsupportedUrl,
    NetworkTimeout,
}

impl Diagnosis {
    pub fn description(&self) -> &'static str {
        match self {
            Self::PostProcessorMissing => "ffmpeg not found",
            Self::DrmProtected => "DRM-protected content",
            Self::Unavailable => "Video unavailable or private",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::RateLimited => "Rate limited",
            Self::Blocked => "Access denied",
            Self::FormatUnavailable => "Requested format is not available",
            Self::UnsupportedUrl => "Unsupported URL",
            Self::NetworkTimeout => "Network timeout",
        }
    }

    /// Short advice appended to status messages
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PostProcessorMissing => Some("install ffmpeg or pass --ffmpeg"),
            Self::AgeRestricted | Self::Blocked => Some("try --cookies with a logged-in browser export"),
            Self::GeoBlocked | Self::RateLimited => Some("wait or try --proxy"),
            Self::FormatUnavailable => Some("analyze the URL again and pick another format"),
            Self::NetworkTimeout => Some("check the connection and retry"),
            Self::DrmProtected | Self::Unavailable | Self::UnsupportedUrl => None,
        }
    }
}

/// Classify yt-dlp stderr, most specific patterns first
pub fn diagnose(stderr: &str) -> Option<Diagnosis> {
    let lower = stderr.to_lowercase();
    let has = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if has(&["ffmpeg not found", "ffprobe not found", "ffprobe/avprobe and ffmpeg/avconv not found"]) {
        return Some(Diagnosis::PostProcessorMissing);
    }
    if has(&["drm", "widevine", "requires purchase", "rental"]) {
        return Some(Diagnosis::DrmProtected);
    }
    if has(&["requested format is not available"]) {
        return Some(Diagnosis::FormatUnavailable);
    }
    if has(&["unsupported url", "is not a valid url"]) {
        return Some(Diagnosis::UnsupportedUrl);
    }
    if has(&["sign in to confirm your age", "age-restricted"]) {
        return Some(Diagnosis::AgeRestricted);
    }
    if has(&["private video", "video unavailable", "video has been removed", "no longer available"]) {
        return Some(Diagnosis::Unavailable);
    }
    if has(&["not available in your country", "blocked in your country"]) {
        return Some(Diagnosis::GeoBlocked);
    }
    if has(&["http error 429", "too many requests", "rate limit"]) {
        return Some(Diagnosis::RateLimited);
    }
    if has(&["confirm you're not a bot", "captcha", "http error 403", "forbidden"]) {
        return Some(Diagnosis::Blocked);
    }
    if has(&["timed out", "timeout", "connection refused", "network is unreachable"]) {
        return Some(Diagnosis::NetworkTimeout);
    }

    None
}

/// Pick the lines of stderr worth showing to the user.
///
/// `ERROR:` lines first; otherwise the last non-empty line, truncated.
pub fn summarize(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .take(2)
        .collect();

    if !errors.is_empty() {
        return errors.join(" | ");
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.chars().take(200).collect())
        .unwrap_or_else(|| "no error output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ffmpeg() {
        let stderr = "ERROR: Postprocessing: ffprobe and ffmpeg not found. Please install or provide the path using --ffmpeg-location";
        assert_eq!(diagnose(stderr), Some(Diagnosis::PostProcessorMissing));
    }

    #[test]
    fn failed_conversion_is_not_missing_ffmpeg() {
        let stderr = "ERROR: Postprocessing: ffmpeg exited with code 1: Conversion failed!";
        assert_ne!(diagnose(stderr), Some(Diagnosis::PostProcessorMissing));
    }

    #[test]
    fn format_gone() {
        let stderr = "ERROR: [youtube] abc: Requested format is not available. Use --list-formats";
        assert_eq!(diagnose(stderr), Some(Diagnosis::FormatUnavailable));
    }

    #[test]
    fn forbidden() {
        assert_eq!(diagnose("ERROR: unable to download video data: HTTP Error 403: Forbidden"), Some(Diagnosis::Blocked));
    }

    #[test]
    fn rate_limited_before_blocked() {
        assert_eq!(diagnose("HTTP Error 429: Too Many Requests"), Some(Diagnosis::RateLimited));
    }

    #[test]
    fn unknown_text() {
        assert_eq!(diagnose("something odd happened"), None);
    }

    #[test]
    fn summary_prefers_error_lines() {
        let stderr = "WARNING: noisy\nERROR: first\nmore\nERROR: second\nERROR: third\n";
        assert_eq!(summarize(stderr), "ERROR: first | ERROR: second");
    }

    #[test]
    fn summary_falls_back_to_last_line() {
        assert_eq!(summarize("line one\nline two\n\n"), "line two");
        assert_eq!(summarize(""), "no error output");
    }
}
