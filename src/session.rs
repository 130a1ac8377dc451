// Session controller
//
// `Session` is the pure state machine: current URL, the filtered format
// table, the selection, the running-task flags and the status line.
// `Controller` owns a session plus the event channel, spawns probe and
// download tasks, and applies their events. It never blocks on a worker.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::config::OutputDirs;
use crate::downloader::errors::{DownloadError, GuardViolation, ProbeError, SelectionError};
use crate::downloader::extractors::MediaExtractor;
use crate::downloader::format_selector::{FormatRow, FormatSelector, SizeEstimate};
use crate::downloader::humanize::file_size_human;
use crate::downloader::models::{DownloadOptions, DownloadOutcome, FormatDescriptor, MediaMetadata};
use crate::downloader::tasks::{self, DownloadEvent, DownloadJob, EventSender, ProbeEvent, TaskEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Probing,
    Probed,
    Selected,
    Downloading,
    /// Reported once when a download finishes; the session then rests in
    /// `Selected`
    Downloaded,
    DownloadFailed,
}

/// The chosen row of the format table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub index: usize,
    pub format_id: String,
}

/// What applying an event changed, for the front end to render
#[derive(Debug)]
pub enum Notice {
    Status(String),
    Progress(u8),
    /// A probe produced a table; `picked` is the auto-selected row
    FormatsReady { rows: usize, picked: Option<usize> },
    ProbeFailed(ProbeError),
    ProbeFinished,
    DownloadFinished {
        state: SessionState,
        result: Result<DownloadOutcome, DownloadError>,
    },
}

#[derive(Debug, Default)]
pub struct Session {
    current_url: Option<String>,
    metadata: Option<MediaMetadata>,
    formats: Vec<FormatDescriptor>,
    rows: Vec<FormatRow>,
    selection: Option<Selection>,
    probe_running: bool,
    download_running: bool,
    /// Bumped whenever a probe replaces the table
    table_generation: u64,
    /// Format id of the download in flight and the table it was picked from
    downloading_format: Option<(String, u64)>,
    status: String,
    progress: u8,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.probe_running {
            SessionState::Probing
        } else if self.download_running {
            SessionState::Downloading
        } else if self.selection.is_some() {
            SessionState::Selected
        } else if self.metadata.is_some() {
            SessionState::Probed
        } else {
            SessionState::Idle
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn metadata(&self) -> Option<&MediaMetadata> {
        self.metadata.as_ref()
    }

    /// Filtered (progressive MP4) formats, in table order
    pub fn formats(&self) -> &[FormatDescriptor] {
        &self.formats
    }

    pub fn rows(&self) -> &[FormatRow] {
        &self.rows
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_probe_running(&self) -> bool {
        self.probe_running
    }

    pub fn is_download_running(&self) -> bool {
        self.download_running
    }

    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = text.into();
        tracing::info!(status = %self.status, "status");
    }

    /// Start a probe of `url`; returns the trimmed URL to analyze.
    ///
    /// The previous table and selection are discarded right away.
    pub fn begin_probe(&mut self, url: &str) -> Result<String, GuardViolation> {
        let url = url.trim();
        if url.is_empty() {
            return Err(GuardViolation::EmptyUrl);
        }
        if self.probe_running {
            return Err(GuardViolation::ProbeRunning);
        }

        self.current_url = Some(url.to_string());
        self.metadata = None;
        self.formats.clear();
        self.rows.clear();
        self.selection = None;
        self.table_generation += 1;
        self.progress = 0;
        self.probe_running = true;
        self.set_status("analyzing…");

        Ok(url.to_string())
    }

    pub fn select_index(&mut self, index: usize) -> Result<&Selection, SelectionError> {
        if self.formats.is_empty() {
            return Err(SelectionError::NoFormats);
        }
        let format = self.formats.get(index).ok_or(SelectionError::IndexOutOfRange {
            index,
            len: self.formats.len(),
        })?;
        if format.format_id.is_empty() {
            return Err(SelectionError::EmptyFormatId);
        }

        let format_id = format.format_id.clone();
        let label = self
            .rows
            .get(index)
            .map(|row| row.resolution.clone())
            .unwrap_or_default();
        self.set_status(format!("selected {} ({})", format_id, label));

        Ok(self.selection.insert(Selection { index, format_id }))
    }

    pub fn select_id(&mut self, format_id: &str) -> Result<&Selection, SelectionError> {
        if format_id.is_empty() {
            return Err(SelectionError::EmptyFormatId);
        }
        if self.formats.is_empty() {
            return Err(SelectionError::NoFormats);
        }
        let index = self
            .formats
            .iter()
            .position(|f| f.format_id == format_id)
            .ok_or_else(|| SelectionError::UnknownFormat(format_id.to_string()))?;

        self.select_index(index)
    }

    /// Start a download of the current selection
    pub fn begin_download(
        &mut self,
        options: DownloadOptions,
        dirs: &OutputDirs,
    ) -> Result<DownloadJob, GuardViolation> {
        if self.download_running {
            return Err(GuardViolation::DownloadRunning);
        }
        if self.probe_running {
            return Err(GuardViolation::ProbeRunning);
        }
        let url = self.current_url.clone().ok_or(GuardViolation::EmptyUrl)?;
        let selection = self.selection.as_ref().ok_or(GuardViolation::NoSelection)?;
        if options.is_empty() {
            return Err(GuardViolation::NothingRequested);
        }

        let job = DownloadJob {
            url,
            format_id: selection.format_id.clone(),
            options,
            dirs: dirs.clone(),
        };

        self.download_running = true;
        self.downloading_format = Some((job.format_id.clone(), self.table_generation));
        self.progress = 0;
        self.set_status(format!("starting download of format {}…", job.format_id));

        Ok(job)
    }

    /// Record a rejected action on the status line; state is untouched
    pub fn report(&mut self, err: &dyn std::error::Error) {
        tracing::warn!(error = %err, "action rejected");
        self.set_status(err.to_string());
    }

    /// Apply one worker event
    pub fn handle_event(&mut self, event: TaskEvent) -> Notice {
        match event {
            TaskEvent::Probe(event) => self.handle_probe(event),
            TaskEvent::Download(event) => self.handle_download(event),
        }
    }

    fn handle_probe(&mut self, event: ProbeEvent) -> Notice {
        match event {
            ProbeEvent::Status(text) => {
                self.set_status(text.clone());
                Notice::Status(text)
            }
            ProbeEvent::Ready(metadata) => self.apply_probe_result(metadata),
            ProbeEvent::Failed(err) => Notice::ProbeFailed(err),
            ProbeEvent::Finished => {
                self.probe_running = false;
                Notice::ProbeFinished
            }
        }
    }

    fn apply_probe_result(&mut self, metadata: MediaMetadata) -> Notice {
        self.formats = FormatSelector::filter_combined(&metadata.formats);
        self.rows = FormatSelector::build_rows(&self.formats, metadata.duration_seconds);
        self.selection = None;
        tracing::debug!(
            total = metadata.formats.len(),
            progressive = self.formats.len(),
            "format table built"
        );
        self.metadata = Some(metadata);

        if self.rows.is_empty() {
            self.set_status("no progressive MP4 format found");
            return Notice::FormatsReady { rows: 0, picked: None };
        }

        self.set_status(format!("select a format ({} available)", self.rows.len()));

        let picked = FormatSelector::auto_pick(&self.formats);
        if let Some(index) = picked {
            if let Err(e) = self.select_index(index) {
                tracing::debug!(error = %e, "auto-pick not selectable");
            }
        }

        Notice::FormatsReady {
            rows: self.rows.len(),
            picked: self.selection.as_ref().map(|s| s.index),
        }
    }

    fn handle_download(&mut self, event: DownloadEvent) -> Notice {
        match event {
            DownloadEvent::Status(text) => {
                self.set_status(text.clone());
                Notice::Status(text)
            }
            DownloadEvent::Progress(percent) => {
                self.progress = percent.min(100);
                Notice::Progress(self.progress)
            }
            DownloadEvent::Finished(result) => {
                self.download_running = false;
                let target = self.downloading_format.take();

                let state = match &result {
                    Ok(outcome) => {
                        // A later probe may have rebuilt the table with the same format ids
                        let current = target.filter(|(_, generation)| *generation == self.table_generation);
                        if let (Some((id, _)), Some(path)) = (current, outcome.video_path.as_ref()) {
                            self.update_row_size(&id, path);
                        }
                        SessionState::Downloaded
                    }
                    Err(_) => SessionState::DownloadFailed,
                };

                Notice::DownloadFinished { state, result }
            }
        }
    }

    // Replace the estimate with the size of the file on disk
    fn update_row_size(&mut self, format_id: &str, path: &std::path::Path) {
        let Some(row) = self.rows.iter_mut().find(|r| r.format_id == format_id) else {
            return;
        };
        let (text, bytes) = file_size_human(path);
        if bytes.is_some() {
            row.size = SizeEstimate {
                bytes,
                approximate: false,
            };
            row.size_text = text;
        }
    }
}

/// Drives a session: spawns tasks and applies their events
pub struct Controller {
    session: Session,
    extractor: Arc<dyn MediaExtractor>,
    dirs: OutputDirs,
    tx: EventSender,
    rx: UnboundedReceiver<TaskEvent>,
}

impl Controller {
    pub fn new(extractor: Arc<dyn MediaExtractor>, dirs: OutputDirs) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            session: Session::new(),
            extractor,
            dirs,
            tx,
            rx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dirs(&self) -> &OutputDirs {
        &self.dirs
    }

    /// Start analyzing `url` in the background
    pub fn analyze(&mut self, url: &str) -> Result<(), GuardViolation> {
        let url = self.session.begin_probe(url).map_err(|e| {
            self.session.report(&e);
            e
        })?;

        tasks::spawn_probe(Arc::clone(&self.extractor), url, self.tx.clone());
        Ok(())
    }

    pub fn select_index(&mut self, index: usize) -> Result<Selection, SelectionError> {
        match self.session.select_index(index) {
            Ok(selection) => Ok(selection.clone()),
            Err(e) => {
                self.session.report(&e);
                Err(e)
            }
        }
    }

    pub fn select_id(&mut self, format_id: &str) -> Result<Selection, SelectionError> {
        match self.session.select_id(format_id) {
            Ok(selection) => Ok(selection.clone()),
            Err(e) => {
                self.session.report(&e);
                Err(e)
            }
        }
    }

    /// Start downloading the selected format in the background
    pub fn download(&mut self, options: DownloadOptions) -> Result<(), GuardViolation> {
        let job = self.session.begin_download(options, &self.dirs).map_err(|e| {
            self.session.report(&e);
            e
        })?;

        tracing::info!(url = %job.url, format_id = %job.format_id, ?options, "download requested");
        tasks::spawn_download(Arc::clone(&self.extractor), job, self.tx.clone());
        Ok(())
    }

    /// Wait for the next worker event and apply it
    pub async fn next_event(&mut self) -> Option<Notice> {
        let event = self.rx.recv().await?;
        Some(self.session.handle_event(event))
    }

    /// Apply events until the running probe finishes.
    ///
    /// Every notice is passed to `on_notice` first.
    pub async fn wait_probe(&mut self, mut on_notice: impl FnMut(&Notice)) -> Result<(), ProbeError> {
        let mut failure = None;
        while self.session.is_probe_running() {
            let Some(notice) = self.next_event().await else { break };
            on_notice(&notice);
            if let Notice::ProbeFailed(err) = notice {
                failure = Some(err);
            }
        }
        failure.map_or(Ok(()), Err)
    }

    /// Apply events until the running download finishes
    pub async fn wait_download(
        &mut self,
        mut on_notice: impl FnMut(&Notice),
    ) -> Option<Result<DownloadOutcome, DownloadError>> {
        while self.session.is_download_running() {
            let notice = self.next_event().await?;
            on_notice(&notice);
            if let Notice::DownloadFinished { result, .. } = notice {
                return Some(result);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::fake::{progressive, FetchScript, ScriptedExtractor};
    use assert_matches::assert_matches;

    fn mixed_metadata() -> MediaMetadata {
        let mut webm = progressive("43", 1080);
        webm.extension = Some("webm".to_string());
        MediaMetadata {
            id: Some("abc".to_string()),
            title: Some("Clip".to_string()),
            duration_seconds: Some(60.0),
            formats: vec![progressive("18", 480), webm, progressive("22", 720)],
        }
    }

    fn controller(extractor: ScriptedExtractor, dirs: OutputDirs) -> Controller {
        Controller::new(Arc::new(extractor), dirs)
    }

    #[tokio::test]
    async fn analyze_select_download() {
        let root = tempfile::tempdir().unwrap();
        let dirs = OutputDirs::under(root.path());
        dirs.ensure_exists().unwrap();
        let video = dirs.video_dir.join("Clip.mp4");
        std::fs::write(&video, vec![0u8; 2048]).unwrap();

        let extractor = ScriptedExtractor::with_metadata(mixed_metadata())
            .video(FetchScript::progress(&[(50, Some(100))], Some(video.clone())));
        let mut ctl = controller(extractor, dirs);

        ctl.analyze("  https://youtu.be/abc  ").unwrap();
        assert_eq!(ctl.session().state(), SessionState::Probing);
        ctl.wait_probe(|_| {}).await.unwrap();

        assert_eq!(ctl.session().state(), SessionState::Selected);
        assert_eq!(ctl.session().current_url(), Some("https://youtu.be/abc"));
        assert_eq!(ctl.session().rows().len(), 2);
        assert_eq!(
            ctl.session().selection(),
            Some(&Selection { index: 1, format_id: "22".to_string() })
        );

        ctl.download(DownloadOptions::video_only()).unwrap();
        assert_eq!(ctl.session().state(), SessionState::Downloading);

        let mut progress = Vec::new();
        let mut finished_state = None;
        let result = ctl
            .wait_download(|notice| match notice {
                Notice::Progress(p) => progress.push(*p),
                Notice::DownloadFinished { state, .. } => finished_state = Some(*state),
                _ => {}
            })
            .await
            .unwrap();

        assert_eq!(progress, vec![0, 50, 100]);
        assert_eq!(finished_state, Some(SessionState::Downloaded));
        assert_eq!(result.unwrap().video_path, Some(video));
        assert_eq!(ctl.session().state(), SessionState::Selected);
        assert_eq!(ctl.session().status(), "done");
        assert_eq!(ctl.session().rows()[1].size_text, "2.0 Ko");
        assert_eq!(ctl.session().rows()[0].size_text, "4.6 Mo");
    }

    #[tokio::test]
    async fn guard_violation_keeps_state() {
        let mut ctl = controller(ScriptedExtractor::with_formats(&[("22", 720)]), OutputDirs::under("/unused"));

        assert_eq!(ctl.download(DownloadOptions::default()), Err(GuardViolation::EmptyUrl));
        assert_eq!(ctl.session().state(), SessionState::Idle);
        assert_eq!(ctl.session().status(), "missing URL");

        assert_eq!(ctl.analyze("   "), Err(GuardViolation::EmptyUrl));
        assert_eq!(ctl.session().state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn second_probe_rejected_while_running() {
        let mut ctl = controller(ScriptedExtractor::with_formats(&[("22", 720)]), OutputDirs::under("/unused"));

        ctl.analyze("https://youtu.be/abc").unwrap();
        assert_eq!(ctl.analyze("https://youtu.be/def"), Err(GuardViolation::ProbeRunning));
        assert_eq!(ctl.session().current_url(), Some("https://youtu.be/abc"));

        ctl.wait_probe(|_| {}).await.unwrap();
        assert_eq!(ctl.session().state(), SessionState::Selected);
    }

    #[tokio::test]
    async fn new_probe_discards_selection() {
        let mut ctl = controller(ScriptedExtractor::with_formats(&[("22", 720)]), OutputDirs::under("/unused"));
        ctl.analyze("https://youtu.be/abc").unwrap();
        ctl.wait_probe(|_| {}).await.unwrap();
        assert!(ctl.session().selection().is_some());

        ctl.analyze("https://youtu.be/abc").unwrap();

        assert_eq!(ctl.session().selection(), None);
        assert!(ctl.session().rows().is_empty());
        assert_eq!(ctl.session().state(), SessionState::Probing);
        assert_eq!(ctl.download(DownloadOptions::default()), Err(GuardViolation::NoSelection));
    }

    #[tokio::test]
    async fn download_guards() {
        let root = tempfile::tempdir().unwrap();
        let mut ctl = controller(
            ScriptedExtractor::with_formats(&[("22", 720)]),
            OutputDirs::under(root.path()),
        );
        ctl.analyze("https://youtu.be/abc").unwrap();
        ctl.wait_probe(|_| {}).await.unwrap();

        let nothing = DownloadOptions { want_video: false, want_audio: false };
        assert_eq!(ctl.download(nothing), Err(GuardViolation::NothingRequested));
        assert_eq!(ctl.session().state(), SessionState::Selected);

        ctl.download(DownloadOptions::video_only()).unwrap();
        assert_eq!(ctl.download(DownloadOptions::video_only()), Err(GuardViolation::DownloadRunning));

        let result = ctl.wait_download(|_| {}).await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn probe_failure_returns_to_idle() {
        let mut ctl = controller(
            ScriptedExtractor::failing_probe("ERROR: [youtube] abc: Video unavailable"),
            OutputDirs::under("/unused"),
        );

        ctl.analyze("https://youtu.be/abc").unwrap();
        let err = ctl.wait_probe(|_| {}).await.unwrap_err();

        assert!(err.to_string().contains("Video unavailable"));
        assert_eq!(ctl.session().state(), SessionState::Idle);
        assert!(ctl.session().status().starts_with("analysis failed"));
    }

    #[tokio::test]
    async fn probe_and_download_overlap() {
        let root = tempfile::tempdir().unwrap();
        let mut ctl = controller(
            ScriptedExtractor::with_formats(&[("22", 720)]),
            OutputDirs::under(root.path()),
        );
        ctl.analyze("https://youtu.be/abc").unwrap();
        ctl.wait_probe(|_| {}).await.unwrap();

        ctl.download(DownloadOptions::video_only()).unwrap();
        ctl.analyze("https://youtu.be/abc").unwrap();
        assert!(ctl.session().is_download_running());
        assert!(ctl.session().is_probe_running());

        ctl.wait_probe(|_| {}).await.unwrap();
        while ctl.session().is_download_running() {
            ctl.next_event().await;
        }
        assert_eq!(ctl.session().state(), SessionState::Selected);
    }

    #[test]
    fn no_progressive_formats() {
        let mut session = Session::new();
        session.begin_probe("https://youtu.be/abc").unwrap();

        let mut webm = progressive("43", 360);
        webm.extension = Some("webm".to_string());
        let metadata = MediaMetadata {
            formats: vec![webm],
            ..Default::default()
        };

        let notice = session.handle_event(TaskEvent::Probe(ProbeEvent::Ready(metadata)));
        session.handle_event(TaskEvent::Probe(ProbeEvent::Finished));

        assert_matches!(notice, Notice::FormatsReady { rows: 0, picked: None });
        assert_eq!(session.status(), "no progressive MP4 format found");
        assert_eq!(session.state(), SessionState::Probed);
        assert_eq!(session.select_index(0), Err(SelectionError::NoFormats));
    }

    #[test]
    fn selection_errors() {
        let mut session = Session::new();
        session.begin_probe("u").unwrap();
        let blank = progressive("", 360);
        let metadata = MediaMetadata {
            formats: vec![progressive("18", 360), blank],
            ..Default::default()
        };
        session.handle_event(TaskEvent::Probe(ProbeEvent::Ready(metadata)));

        assert_eq!(
            session.select_index(5),
            Err(SelectionError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(session.select_index(1), Err(SelectionError::EmptyFormatId));
        assert_eq!(session.select_id("99"), Err(SelectionError::UnknownFormat("99".to_string())));
        assert_eq!(session.select_id(""), Err(SelectionError::EmptyFormatId));
        assert_eq!(session.select_id("18").map(|s| s.index), Ok(0));
    }

    #[test]
    fn progress_is_clamped() {
        let mut session = Session::new();
        session.handle_event(TaskEvent::Download(DownloadEvent::Progress(150)));
        assert_eq!(session.progress(), 100);
    }

    #[test]
    fn failed_download_keeps_table() {
        let mut session = Session::new();
        session.begin_probe("u").unwrap();
        session.handle_event(TaskEvent::Probe(ProbeEvent::Ready(MediaMetadata {
            formats: vec![progressive("22", 720)],
            ..Default::default()
        })));
        session.handle_event(TaskEvent::Probe(ProbeEvent::Finished));
        session.begin_download(DownloadOptions::video_only(), &OutputDirs::under("/x")).unwrap();

        let err = crate::downloader::errors::ExtractionError::from_stderr("yt-dlp", Some(1), "ERROR: boom");
        let notice = session.handle_event(TaskEvent::Download(DownloadEvent::Finished(Err(
            DownloadError::Video(err),
        ))));

        assert_matches!(notice, Notice::DownloadFinished { state: SessionState::DownloadFailed, result: Err(_) });
        assert_eq!(session.state(), SessionState::Selected);
        assert_eq!(session.rows().len(), 1);
    }

    fn probed(session: &mut Session, url: &str, formats: Vec<FormatDescriptor>) {
        session.begin_probe(url).unwrap();
        session.handle_event(TaskEvent::Probe(ProbeEvent::Ready(MediaMetadata {
            duration_seconds: Some(60.0),
            formats,
            ..Default::default()
        })));
        session.handle_event(TaskEvent::Probe(ProbeEvent::Finished));
    }

    #[test]
    fn late_download_leaves_newer_table_alone() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("A.mp4");
        std::fs::write(&file, vec![0u8; 2048]).unwrap();

        let mut session = Session::new();
        probed(&mut session, "https://youtu.be/A", vec![progressive("22", 720)]);
        session.begin_download(DownloadOptions::video_only(), &OutputDirs::under(root.path())).unwrap();

        probed(&mut session, "https://youtu.be/B", vec![progressive("22", 720)]);
        let before = session.rows()[0].size_text.clone();

        let outcome = DownloadOutcome {
            video_path: Some(file),
            ..Default::default()
        };
        let notice = session.handle_event(TaskEvent::Download(DownloadEvent::Finished(Ok(outcome))));

        assert_matches!(notice, Notice::DownloadFinished { state: SessionState::Downloaded, .. });
        assert_eq!(session.rows()[0].size_text, before);
        assert_eq!(session.current_url(), Some("https://youtu.be/B"));
    }

    #[test]
    fn no_download_until_probe_finishes() {
        let mut session = Session::new();
        session.begin_probe("https://youtu.be/abc").unwrap();
        session.handle_event(TaskEvent::Probe(ProbeEvent::Ready(MediaMetadata {
            formats: vec![progressive("22", 720)],
            ..Default::default()
        })));
        assert!(session.selection().is_some());
        assert_eq!(session.state(), SessionState::Probing);

        let dirs = OutputDirs::under("/x");
        assert_eq!(
            session.begin_download(DownloadOptions::video_only(), &dirs),
            Err(GuardViolation::ProbeRunning)
        );

        session.handle_event(TaskEvent::Probe(ProbeEvent::Finished));
        assert!(session.begin_download(DownloadOptions::video_only(), &dirs).is_ok());
    }
}
