// Human-readable sizes and durations

use std::path::Path;

const UNITS: [&str; 5] = ["o", "Ko", "Mo", "Go", "To"];

/// Render a byte count, stepping through o/Ko/Mo/Go/To by 1024.
///
/// Absent or zero sizes render as `"?"`. Approximate values get a `~` prefix.
pub fn format_bytes_human(bytes: Option<u64>, approximate: bool) -> String {
    let bytes = match bytes {
        Some(b) if b > 0 => b,
        _ => return "?".to_string(),
    };

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let text = format!("{:.1} {}", value, UNITS[unit]);
    if approximate {
        format!("~{}", text)
    } else {
        text
    }
}

/// Render a duration as `m:ss` or `h:mm:ss`, `"?"` when unknown
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s as u64,
        _ => return "?".to_string(),
    };

    let (minutes, secs) = (total / 60, total % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Exact size of a file on disk, rendered and raw.
///
/// Used once a download has landed to replace the estimate shown beforehand.
pub fn file_size_human(path: &Path) -> (String, Option<u64>) {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let size = meta.len();
            (format_bytes_human(Some(size), false), Some(size))
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cannot stat downloaded file");
            ("?".to_string(), None)
        }
    }
}
