// Probe and download tasks
//
// Both run on spawned tokio tasks and talk back to the controller only
// through `TaskEvent`s on an unbounded channel. Send errors are ignored: a
// controller that went away no longer cares about progress.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::errors::{DownloadError, ExtractionError, ProbeError};
use super::extractors::{FetchEvent, FetchOutput, FetchRequest, MediaExtractor};
use super::models::{DownloadOptions, DownloadOutcome, MediaMetadata};
use crate::config::OutputDirs;

#[derive(Debug)]
pub enum ProbeEvent {
    Status(String),
    Ready(MediaMetadata),
    Failed(ProbeError),
    /// Always last, after `Ready` or `Failed`
    Finished,
}

#[derive(Debug)]
pub enum DownloadEvent {
    Status(String),
    /// Percentage of the current step
    Progress(u8),
    /// Always last
    Finished(Result<DownloadOutcome, DownloadError>),
}

/// Worker to controller message
#[derive(Debug)]
pub enum TaskEvent {
    Probe(ProbeEvent),
    Download(DownloadEvent),
}

pub type EventSender = UnboundedSender<TaskEvent>;

/// Everything a download task needs, captured when it starts
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub url: String,
    pub format_id: String,
    pub options: DownloadOptions,
    pub dirs: OutputDirs,
}

pub fn spawn_probe(extractor: Arc<dyn MediaExtractor>, url: String, tx: EventSender) -> JoinHandle<()> {
    tokio::spawn(async move { run_probe(extractor.as_ref(), &url, &tx).await })
}

/// Probe `url`, reporting through `tx`.
///
/// Sequence: status, status (result), `Ready` or `Failed`, `Finished`.
pub async fn run_probe(extractor: &dyn MediaExtractor, url: &str, tx: &EventSender) {
    let status = |text: String| {
        let _ = tx.send(TaskEvent::Probe(ProbeEvent::Status(text)));
    };

    status(format!("analyzing {}…", url));
    tracing::debug!(extractor = extractor.name(), url, "probe task started");

    match extractor.probe(url).await {
        Ok(metadata) => {
            status(format!("found {} formats", metadata.formats.len()));
            let _ = tx.send(TaskEvent::Probe(ProbeEvent::Ready(metadata)));
        }
        Err(e) => {
            let err = ProbeError::from(e);
            tracing::warn!(url, error = %err, "probe failed");
            status(err.status_text());
            let _ = tx.send(TaskEvent::Probe(ProbeEvent::Failed(err)));
        }
    }

    let _ = tx.send(TaskEvent::Probe(ProbeEvent::Finished));
}

pub fn spawn_download(extractor: Arc<dyn MediaExtractor>, job: DownloadJob, tx: EventSender) -> JoinHandle<()> {
    tokio::spawn(async move { run_download(extractor.as_ref(), &job, &tx).await })
}

/// Run the video and audio steps in order, then send `Finished`
pub async fn run_download(extractor: &dyn MediaExtractor, job: &DownloadJob, tx: &EventSender) {
    let result = download_steps(extractor, job, tx).await;

    let text = match &result {
        Ok(outcome) if outcome.audio_skipped => "done (audio skipped)".to_string(),
        Ok(_) => "done".to_string(),
        Err(e) => {
            tracing::warn!(url = %job.url, format_id = %job.format_id, error = %e, "download failed");
            e.status_text()
        }
    };
    send_download(tx, DownloadEvent::Status(text));
    send_download(tx, DownloadEvent::Finished(result));
}

async fn download_steps(
    extractor: &dyn MediaExtractor,
    job: &DownloadJob,
    tx: &EventSender,
) -> Result<DownloadOutcome, DownloadError> {
    let steps = usize::from(job.options.want_video) + usize::from(job.options.want_audio);
    let mut step = 0;
    let mut outcome = DownloadOutcome::default();

    if job.options.want_video {
        step += 1;
        std::fs::create_dir_all(&job.dirs.video_dir)?;
        begin_step(tx, format!("downloading video ({}/{})", step, steps));

        let request = FetchRequest::video(&job.url, &job.format_id, &job.dirs);
        let output = fetch_step(extractor, &request, tx)
            .await
            .map_err(DownloadError::Video)?;
        outcome.video_path = reported_path(output);
    }

    if job.options.want_audio {
        step += 1;
        std::fs::create_dir_all(&job.dirs.audio_dir)?;
        begin_step(tx, format!("extracting audio ({}/{})", step, steps));

        if !extractor.post_processor_available().await {
            skip_audio(tx, &mut outcome, "ffmpeg not found, audio extraction skipped");
            return Ok(outcome);
        }

        let request = FetchRequest::audio(&job.url, &job.dirs);
        match fetch_step(extractor, &request, tx).await {
            Ok(output) => outcome.audio_path = reported_path(output),
            Err(e) if e.is_post_processor_missing() => {
                skip_audio(tx, &mut outcome, "ffmpeg unavailable to yt-dlp, audio extraction skipped");
            }
            Err(e) => return Err(DownloadError::Audio(e)),
        }
    }

    Ok(outcome)
}

/// Reset progress and announce the step
fn begin_step(tx: &EventSender, status: String) {
    tracing::info!(step = %status, "download step");
    send_download(tx, DownloadEvent::Progress(0));
    send_download(tx, DownloadEvent::Status(status));
}

fn skip_audio(tx: &EventSender, outcome: &mut DownloadOutcome, reason: &str) {
    tracing::warn!("{}", reason);
    outcome.audio_skipped = true;
    send_download(tx, DownloadEvent::Status(reason.to_string()));
}

/// One fetch with step-local, non-decreasing progress
async fn fetch_step(
    extractor: &dyn MediaExtractor,
    request: &FetchRequest,
    tx: &EventSender,
) -> Result<FetchOutput, ExtractionError> {
    let last = AtomicU8::new(0);
    let hook = |event: FetchEvent| {
        let percent = event.percent();
        let previous = last.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            send_download(tx, DownloadEvent::Progress(percent));
        }
    };

    extractor.fetch(request, &hook).await
}

fn reported_path(output: FetchOutput) -> Option<PathBuf> {
    output.primary().cloned()
}

fn send_download(tx: &EventSender, event: DownloadEvent) {
    let _ = tx.send(TaskEvent::Download(event));
}
