//! CLI argument definitions using clap, and the one-shot commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::config::{AppConfig, OutputDirs};
use crate::downloader::extractors::{MediaExtractor, YtDlpCli};
use crate::downloader::format_selector::FormatRow;
use crate::downloader::humanize::format_duration;
use crate::downloader::models::{DownloadOptions, DownloadOutcome};
use crate::downloader::tools::{ToolInfo, ToolManager};
use crate::session::{Controller, Notice, Session};

#[derive(Debug, Parser)]
#[command(name = "ytgrab")]
#[command(about = "Inspect YouTube formats and download video or MP3 audio through yt-dlp")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings shared by every command; each falls back to an environment variable
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Directory for downloaded videos
    #[arg(long, env = "YTGRAB_VIDEO_DIR", global = true)]
    pub video_dir: Option<PathBuf>,

    /// Directory for extracted MP3 files
    #[arg(long, env = "YTGRAB_AUDIO_DIR", global = true)]
    pub audio_dir: Option<PathBuf>,

    /// Path to the yt-dlp binary (default: discovered)
    #[arg(long = "yt-dlp", env = "YTGRAB_YTDLP", global = true)]
    pub ytdlp: Option<PathBuf>,

    /// Path to ffmpeg, also passed to yt-dlp
    #[arg(long, env = "YTGRAB_FFMPEG", global = true)]
    pub ffmpeg: Option<PathBuf>,

    /// Proxy URL handed to yt-dlp (e.g. socks5h://127.0.0.1:1080)
    #[arg(long, env = "YTGRAB_PROXY", global = true)]
    pub proxy: Option<String>,

    /// Netscape cookies.txt handed to yt-dlp
    #[arg(long, env = "YTGRAB_COOKIES", global = true)]
    pub cookies: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn resolve(&self) -> AppConfig {
        AppConfig::new(OutputDirs::system_default())
            .with_video_dir(self.video_dir.clone())
            .with_audio_dir(self.audio_dir.clone())
            .with_ytdlp_path(self.ytdlp.clone())
            .with_ffmpeg_path(self.ffmpeg.clone())
            .with_proxy(self.proxy.clone())
            .with_cookies_path(self.cookies.clone())
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze a URL and list the progressive MP4 formats
    Formats {
        /// Video URL
        url: String,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze a URL, pick a format and download it
    Download {
        /// Video URL
        url: String,

        /// Format id to download (default: 720p, else the tallest)
        #[arg(short, long, conflicts_with = "index")]
        format: Option<String>,

        /// Row number from `formats` to download (starts at 1)
        #[arg(short, long, value_parser = parse_row)]
        index: Option<usize>,

        /// Skip the video step
        #[arg(long)]
        no_video: bool,

        /// Skip the MP3 step
        #[arg(long)]
        no_audio: bool,
    },

    /// Interactive session
    Shell,

    /// Show yt-dlp and ffmpeg availability
    Tools {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute CLI command - separated for testing.
pub async fn run_cli(cli: Cli) -> Result<()> {
    tracing::debug!(?cli, "parsed arguments");
    let config = cli.config.resolve();

    if let Commands::Tools { json } = cli.command {
        return print_tools(&ToolManager::from_config(&config).get_all_tools(), json);
    }

    config.output.ensure_exists()?;
    let extractor: Arc<dyn MediaExtractor> = Arc::new(YtDlpCli::from_config(&config));
    let mut controller = Controller::new(extractor, config.output.clone());

    match cli.command {
        Commands::Formats { url, json } => formats(&mut controller, &url, json).await,
        Commands::Download {
            url,
            format,
            index,
            no_video,
            no_audio,
        } => {
            let options = DownloadOptions {
                want_video: !no_video,
                want_audio: !no_audio,
            };
            let pick = match (format, index) {
                (Some(id), _) => Pick::Id(id),
                (None, Some(row)) => Pick::Row(row),
                (None, None) => Pick::Auto,
            };
            download(&mut controller, &url, pick, options).await
        }
        Commands::Shell => crate::shell::run_shell(controller).await,
        Commands::Tools { .. } => Ok(()),
    }
}

fn parse_row(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(row) if row >= 1 => Ok(row),
        Ok(_) => Err("rows start at 1".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// How `download` chooses its format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    Auto,
    Id(String),
    /// 1-based table row
    Row(usize),
}

async fn analyze(controller: &mut Controller, url: &str) -> Result<()> {
    controller.analyze(url)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}").wrap_err("invalid spinner template")?);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = controller
        .wait_probe(|notice| {
            if let Notice::Status(text) = notice {
                spinner.set_message(text.clone());
            }
        })
        .await;
    spinner.finish_and_clear();

    result?;
    Ok(())
}

async fn formats(controller: &mut Controller, url: &str, json: bool) -> Result<()> {
    analyze(controller, url).await?;
    let session = controller.session();

    if json {
        println!("{}", serde_json::to_string_pretty(&FormatsReport::from_session(session))?);
    } else {
        print!("{}", render_table(session));
        eprintln!("{}", session.status());
    }
    Ok(())
}

async fn download(controller: &mut Controller, url: &str, pick: Pick, options: DownloadOptions) -> Result<()> {
    analyze(controller, url).await?;

    match pick {
        Pick::Auto => {}
        Pick::Id(id) => {
            controller.select_id(&id)?;
        }
        Pick::Row(row) => {
            controller.select_index(row.saturating_sub(1))?;
        }
    }

    if controller.session().selection().is_none() {
        eyre::bail!("{}", controller.session().status());
    }
    print!("{}", render_table(controller.session()));

    controller.download(options)?;

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .wrap_err("invalid progress template")?
            .progress_chars("━━╌"),
    );

    let result = controller
        .wait_download(|notice| match notice {
            Notice::Status(text) => bar.set_message(text.clone()),
            Notice::Progress(percent) => bar.set_position(u64::from(*percent)),
            _ => {}
        })
        .await;
    bar.finish_and_clear();

    match result {
        Some(Ok(outcome)) => {
            print!("{}", render_outcome(&outcome));
            Ok(())
        }
        Some(Err(e)) => Err(eyre::eyre!(e.status_text())),
        None => eyre::bail!("download ended without a result"),
    }
}

fn print_tools(tools: &[ToolInfo], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tools)?);
        return Ok(());
    }

    for tool in tools {
        match (&tool.path, &tool.version) {
            (Some(path), Some(version)) => println!("{:<8} {} ({})", tool.name, version, path.display()),
            (Some(path), None) => println!("{:<8} unknown version ({})", tool.name, path.display()),
            _ => println!("{:<8} not found", tool.name),
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct FormatsReport<'a> {
    url: Option<&'a str>,
    title: Option<&'a str>,
    duration_seconds: Option<f64>,
    rows: &'a [FormatRow],
    /// 0-based index into `rows`
    picked: Option<usize>,
}

impl<'a> FormatsReport<'a> {
    fn from_session(session: &'a Session) -> Self {
        let metadata = session.metadata();
        Self {
            url: session.current_url(),
            title: metadata.and_then(|m| m.title.as_deref()),
            duration_seconds: metadata.and_then(|m| m.duration_seconds),
            rows: session.rows(),
            picked: session.selection().map(|s| s.index),
        }
    }
}

/// Title line plus the numbered format table; the selected row is starred
pub fn render_table(session: &Session) -> String {
    let mut out = String::new();

    if let Some(metadata) = session.metadata() {
        out.push_str(&format!(
            "{} [{}]\n",
            metadata.title.as_deref().unwrap_or("untitled"),
            format_duration(metadata.duration_seconds)
        ));
    }
    if session.rows().is_empty() {
        return out;
    }

    let selected = session.selection().map(|s| s.index);
    out.push_str(&format!("  {:>3}  {:<8} {:<11} {}\n", "#", "format", "resolution", "size"));
    for (index, row) in session.rows().iter().enumerate() {
        let marker = if selected == Some(index) { '*' } else { ' ' };
        out.push_str(&format!(
            "{} {:>3}  {:<8} {:<11} {}\n",
            marker,
            index + 1,
            row.format_id,
            row.resolution,
            row.size_text
        ));
    }
    out
}

pub fn render_outcome(outcome: &DownloadOutcome) -> String {
    let mut out = String::new();
    if let Some(path) = &outcome.video_path {
        out.push_str(&format!("video: {}\n", path.display()));
    }
    if let Some(path) = &outcome.audio_path {
        out.push_str(&format!("audio: {}\n", path.display()));
    }
    if outcome.audio_skipped {
        out.push_str("audio: skipped (ffmpeg not available)\n");
    }
    if out.is_empty() {
        out.push_str("done\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::tasks::{ProbeEvent, TaskEvent};
    use crate::downloader::models::{FormatDescriptor, MediaMetadata};

    #[test]
    fn parses_formats_command() {
        let cli = Cli::parse_from(["ytgrab", "formats", "https://youtu.be/abc", "--json"]);

        assert!(matches!(
            &cli.command,
            Commands::Formats { url, json: true } if url == "https://youtu.be/abc"
        ));
    }

    #[test]
    fn parses_download_defaults() {
        let cli = Cli::parse_from(["ytgrab", "download", "https://youtu.be/abc"]);

        assert!(matches!(
            &cli.command,
            Commands::Download { format: None, index: None, no_video: false, no_audio: false, .. }
        ));
    }

    #[test]
    fn parses_download_with_format_and_flags() {
        let cli = Cli::parse_from(["ytgrab", "download", "u", "-f", "22", "--no-audio"]);

        assert!(matches!(
            &cli.command,
            Commands::Download { format: Some(f), no_audio: true, no_video: false, .. } if f == "22"
        ));
    }

    #[test]
    fn format_and_index_conflict() {
        let result = Cli::try_parse_from(["ytgrab", "download", "u", "-f", "22", "-i", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn index_starts_at_one() {
        assert!(Cli::try_parse_from(["ytgrab", "download", "u", "-i", "0"]).is_err());
        let cli = Cli::parse_from(["ytgrab", "download", "u", "-i", "2"]);
        assert!(matches!(&cli.command, Commands::Download { index: Some(2), .. }));
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::parse_from(["ytgrab", "shell", "--video-dir", "/tmp/v", "--proxy", "socks5h://h:1"]);
        let config = cli.config.resolve();

        assert!(matches!(cli.command, Commands::Shell));
        assert_eq!(config.output.video_dir, PathBuf::from("/tmp/v"));
        assert_eq!(config.proxy.as_deref(), Some("socks5h://h:1"));
    }

    fn format(id: &str, height: u32) -> FormatDescriptor {
        FormatDescriptor {
            format_id: id.to_string(),
            extension: Some("mp4".to_string()),
            width: Some(height * 16 / 9),
            height: Some(height),
            video_codec: Some("avc1".to_string()),
            audio_codec: Some("mp4a".to_string()),
            filesize_bytes: Some(1_048_576),
            ..Default::default()
        }
    }

    #[test]
    fn table_marks_selected_row() {
        let mut session = Session::new();
        session.begin_probe("u").unwrap();
        session.handle_event(TaskEvent::Probe(ProbeEvent::Ready(MediaMetadata {
            title: Some("Clip".to_string()),
            duration_seconds: Some(61.0),
            formats: vec![format("18", 360), format("22", 720)],
            ..Default::default()
        })));

        let table = render_table(&session);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "Clip [1:01]");
        assert!(lines[2].starts_with("    1  18"));
        assert!(lines[3].starts_with("*   2  22       1280x720    1.0 Mo"));
    }

    #[test]
    fn outcome_lines() {
        let outcome = DownloadOutcome {
            video_path: Some(PathBuf::from("/v/Clip.mp4")),
            audio_path: None,
            audio_skipped: true,
        };
        assert_eq!(
            render_outcome(&outcome),
            "video: /v/Clip.mp4\naudio: skipped (ffmpeg not available)\n"
        );
        assert_eq!(render_outcome(&DownloadOutcome::default()), "done\n");
    }
}
