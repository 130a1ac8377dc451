// CLI MediaExtractor - drives the native `yt-dlp` binary
//
// - Probe: one `--dump-single-json` run, parsed with serde
// - Fetch: streamed run, progress and final paths read from tagged stdout lines
// - Failures: exit status plus stderr, classified by `diagnostics`

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use super::progress::{filepath_template, parse_line, progress_template, OutputLine};
use super::traits::{
    FetchEvent, FetchKind, FetchOutput, FetchRequest, MediaExtractor, AUDIO_CODEC, AUDIO_FORMAT,
    AUDIO_QUALITY_KBPS, MERGE_CONTAINER,
};
use crate::config::AppConfig;
use crate::downloader::errors::ExtractionError;
use crate::downloader::models::MediaMetadata;
use crate::downloader::tools::ToolManager;
use crate::downloader::utils::{join_reader, read_all, run_output, spawn_piped};

/// yt-dlp binary extractor
pub struct YtDlpCli {
    program: PathBuf,
    tools: ToolManager,
    proxy: Option<String>,
    cookies_path: Option<PathBuf>,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlpCli {
    /// Discover yt-dlp now; configured paths take precedence
    pub fn from_config(config: &AppConfig) -> Self {
        let tools = ToolManager::from_config(config);
        let program = tools.ytdlp_program();
        tracing::debug!(program = %program.display(), "using yt-dlp");

        Self {
            program,
            tools,
            proxy: config.proxy.clone(),
            cookies_path: config.cookies_path.clone(),
            ffmpeg_location: config.ffmpeg_path.clone(),
        }
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Options shared by every run
    fn common_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--no-playlist".into()];

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".into());
            args.push(proxy.into());
        }
        if let Some(path) = &self.cookies_path {
            args.push("--cookies".into());
            args.push(path.into());
        }
        if let Some(path) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(path.into());
        }

        args
    }

    /// Read-only metadata dump; certificate check skipped, no error skipping
    pub fn probe_args(&self, url: &str) -> Vec<OsString> {
        let mut args = self.common_args();
        args.extend(
            [
                "--dump-single-json",
                "--skip-download",
                "--no-check-certificates",
                "--no-warnings",
                "--quiet",
                "--",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(url.into());
        args
    }

    pub fn fetch_args(&self, request: &FetchRequest) -> Vec<OsString> {
        let mut args = self.common_args();

        // --print implies --quiet and --simulate; both are undone here
        args.extend(
            [
                "--newline".to_string(),
                "--progress".to_string(),
                "--progress-template".to_string(),
                progress_template(),
                "--print".to_string(),
                filepath_template(),
                "--no-simulate".to_string(),
                "-o".to_string(),
                request.output_template.clone(),
            ]
            .into_iter()
            .map(OsString::from),
        );

        match &request.kind {
            FetchKind::Video { format_id } => {
                args.extend(
                    ["-f", format_id.as_str(), "--merge-output-format", MERGE_CONTAINER]
                        .into_iter()
                        .map(OsString::from),
                );
            }
            FetchKind::Audio => {
                args.extend(
                    [
                        "-f".to_string(),
                        AUDIO_FORMAT.to_string(),
                        "-x".to_string(),
                        "--audio-format".to_string(),
                        AUDIO_CODEC.to_string(),
                        "--audio-quality".to_string(),
                        format!("{}K", AUDIO_QUALITY_KBPS),
                    ]
                    .into_iter()
                    .map(OsString::from),
                );
            }
        }

        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }

    /// Parse `--dump-single-json` output into metadata
    pub fn parse_metadata(stdout: &[u8]) -> Result<MediaMetadata, ExtractionError> {
        let json: serde_json::Value = serde_json::from_slice(stdout)?;

        let object = json
            .as_object()
            .ok_or_else(|| ExtractionError::UnexpectedResponse("expected a JSON object".to_string()))?;

        if object.get("_type").and_then(|t| t.as_str()) == Some("playlist") {
            return Err(ExtractionError::UnexpectedResponse(
                "URL points to a playlist, not a single video".to_string(),
            ));
        }

        Ok(serde_json::from_value(json)?)
    }
}

#[async_trait]
impl MediaExtractor for YtDlpCli {
    fn name(&self) -> &'static str {
        "yt-dlp-cli"
    }

    async fn probe(&self, url: &str) -> Result<MediaMetadata, ExtractionError> {
        let args = self.probe_args(url);
        tracing::info!(url, "probing formats");

        let output = run_output(self.program.as_os_str(), &args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(url, code = ?output.status.code(), "yt-dlp probe failed");
            return Err(ExtractionError::from_stderr(self.program_name(), output.status.code(), &stderr));
        }

        let metadata = Self::parse_metadata(&output.stdout)?;
        tracing::info!(
            url,
            title = metadata.title.as_deref().unwrap_or("?"),
            formats = metadata.formats.len(),
            "probe complete"
        );
        Ok(metadata)
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        hook: &(dyn Fn(FetchEvent) + Send + Sync),
    ) -> Result<FetchOutput, ExtractionError> {
        let args = self.fetch_args(request);
        tracing::info!(url = %request.url, kind = ?request.kind, "starting yt-dlp download");

        let mut child = spawn_piped(self.program.as_os_str(), &args)?;

        let stderr_task = tokio::spawn(read_all(child.stderr.take()));

        let mut output = FetchOutput::default();
        if let Some(stdout) = child.stdout.take() {
            read_fetch_output(BufReader::new(stdout), hook, &mut output).await?;
        }

        let status = child.wait().await?;
        let stderr = join_reader(stderr_task).await?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            tracing::warn!(url = %request.url, code = ?status.code(), "yt-dlp download failed");
            return Err(ExtractionError::from_stderr(self.program_name(), status.code(), &stderr));
        }

        tracing::info!(url = %request.url, files = output.files.len(), "yt-dlp download complete");
        Ok(output)
    }

    async fn post_processor_available(&self) -> bool {
        let tools = self.tools.clone();
        match tokio::task::spawn_blocking(move || tools.ffmpeg_available()).await {
            Ok(available) => available,
            Err(e) => {
                tracing::warn!(error = %e, "ffmpeg check did not complete");
                false
            }
        }
    }
}

/// Consume yt-dlp's stdout until EOF.
///
/// Lines are decoded lossily: titles in a legacy codepage must not abort a
/// running transfer. Only read errors end the loop early.
async fn read_fetch_output<R>(
    mut reader: R,
    hook: &(dyn Fn(FetchEvent) + Send + Sync),
    output: &mut FetchOutput,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\r', '\n']);
        match parse_line(line) {
            Some(OutputLine::Progress(event)) => hook(event),
            Some(OutputLine::File(path)) => {
                tracing::debug!(path = %path.display(), "yt-dlp reported file");
                output.files.push(path);
            }
            None => tracing::trace!(line = %line, "yt-dlp"),
        }
    }
}
