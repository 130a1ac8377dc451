// Machine-readable yt-dlp output lines
//
// yt-dlp is asked to print one tagged line per progress tick and one per
// finished file, so nothing has to scrape its human-oriented console output.

use regex::Regex;
use std::path::PathBuf;

use super::traits::FetchEvent;

/// Tag of progress lines
pub const PROGRESS_TAG: &str = "ytgrab-progress";
/// Tag of final file path lines
pub const FILE_TAG: &str = "ytgrab-file";

/// `--progress-template` value; fields are status, downloaded, total, estimate
pub fn progress_template() -> String {
    format!(
        "download:{} %(progress.status)s %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s",
        PROGRESS_TAG
    )
}

/// `--print` value emitting the final path of every file
pub fn filepath_template() -> String {
    format!("after_move:{} %(filepath)s", FILE_TAG)
}

/// One recognised line of yt-dlp stdout
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(FetchEvent),
    File(PathBuf),
}

/// Parse a stdout line; anything untagged yields `None`
pub fn parse_line(line: &str) -> Option<OutputLine> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"^ytgrab-progress\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s*$"
        ).unwrap();
        static ref FILE_RE: Regex = Regex::new(r"^ytgrab-file\s+(.+?)\s*$").unwrap();
    }

    let line = line.trim_start();

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let status = caps.get(1)?.as_str();
        return match status {
            "finished" => Some(OutputLine::Progress(FetchEvent::Finished)),
            "downloading" => {
                let downloaded = parse_bytes(caps.get(2)?.as_str()).unwrap_or(0);
                let total = parse_bytes(caps.get(3)?.as_str())
                    .filter(|t| *t > 0)
                    .or_else(|| caps.get(4).and_then(|m| parse_bytes(m.as_str())))
                    .filter(|t| *t > 0);
                Some(OutputLine::Progress(FetchEvent::Downloading { downloaded, total }))
            }
            // "error" and anything newer: the exit status carries the outcome
            _ => None,
        };
    }

    if let Some(caps) = FILE_RE.captures(line) {
        let path = caps.get(1)?.as_str();
        if path != "NA" {
            return Some(OutputLine::File(PathBuf::from(path)));
        }
    }

    None
}

// Missing fields come through as "NA"; estimates are floats
fn parse_bytes(field: &str) -> Option<u64> {
    if field == "NA" || field == "None" {
        return None;
    }
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downloading_with_exact_total() {
        assert_eq!(
            parse_line("ytgrab-progress downloading 1024 4096 NA"),
            Some(OutputLine::Progress(FetchEvent::Downloading { downloaded: 1024, total: Some(4096) }))
        );
    }

    #[test]
    fn downloading_falls_back_to_estimate() {
        assert_eq!(
            parse_line("ytgrab-progress downloading 500 NA 1000.7"),
            Some(OutputLine::Progress(FetchEvent::Downloading { downloaded: 500, total: Some(1000) }))
        );
    }

    #[test]
    fn downloading_without_any_total() {
        assert_eq!(
            parse_line("ytgrab-progress downloading 500 NA NA"),
            Some(OutputLine::Progress(FetchEvent::Downloading { downloaded: 500, total: None }))
        );
    }

    #[test]
    fn finished_line() {
        assert_eq!(
            parse_line("ytgrab-progress finished 4096 4096 NA"),
            Some(OutputLine::Progress(FetchEvent::Finished))
        );
    }

    #[test]
    fn file_line_keeps_spaces() {
        assert_eq!(
            parse_line("ytgrab-file /out/videos/My Clip (live).mp4"),
            Some(OutputLine::File(PathBuf::from("/out/videos/My Clip (live).mp4")))
        );
        assert_eq!(parse_line("ytgrab-file NA"), None);
    }

    #[test]
    fn other_output_ignored() {
        assert_eq!(parse_line("[download] Destination: x.mp4"), None);
        assert_eq!(parse_line("ytgrab-progress error NA NA NA"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn templates_carry_tags() {
        assert!(progress_template().starts_with("download:ytgrab-progress "));
        assert_eq!(filepath_template(), "after_move:ytgrab-file %(filepath)s");
    }
}
