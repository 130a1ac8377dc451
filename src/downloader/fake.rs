// Scripted extractor for task and session tests

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

use super::errors::ExtractionError;
use super::extractors::{FetchEvent, FetchKind, FetchOutput, FetchRequest, MediaExtractor};
use super::models::{FormatDescriptor, MediaMetadata};

/// How one fetch behaves
#[derive(Debug, Clone)]
pub enum FetchScript {
    /// Emit these byte counts, then `Finished`, then report `file`
    Succeed {
        ticks: Vec<(u64, Option<u64>)>,
        file: Option<PathBuf>,
    },
    /// Exit with this stderr
    Fail(String),
}

impl FetchScript {
    pub fn progress(ticks: &[(u64, Option<u64>)], file: Option<PathBuf>) -> Self {
        Self::Succeed {
            ticks: ticks.to_vec(),
            file,
        }
    }
}

impl Default for FetchScript {
    fn default() -> Self {
        Self::progress(&[], None)
    }
}

pub struct ScriptedExtractor {
    probe: Result<MediaMetadata, String>,
    video: FetchScript,
    audio: FetchScript,
    ffmpeg: bool,
    fetched: Mutex<Vec<FetchRequest>>,
}

pub fn progressive(id: &str, height: u32) -> FormatDescriptor {
    FormatDescriptor {
        format_id: id.to_string(),
        extension: Some("mp4".to_string()),
        width: Some(height * 16 / 9),
        height: Some(height),
        video_codec: Some("avc1.4d401f".to_string()),
        audio_codec: Some("mp4a.40.2".to_string()),
        filesize_bytes: Some(u64::from(height) * 10_000),
        ..Default::default()
    }
}

impl ScriptedExtractor {
    pub fn with_metadata(metadata: MediaMetadata) -> Self {
        Self {
            probe: Ok(metadata),
            video: FetchScript::default(),
            audio: FetchScript::default(),
            ffmpeg: true,
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Progressive MP4 formats with the given ids and heights
    pub fn with_formats(formats: &[(&str, u32)]) -> Self {
        Self::with_metadata(MediaMetadata {
            id: Some("abc".to_string()),
            title: Some("Clip".to_string()),
            duration_seconds: Some(60.0),
            formats: formats.iter().map(|(id, h)| progressive(id, *h)).collect(),
        })
    }

    pub fn failing_probe(stderr: &str) -> Self {
        let mut extractor = Self::with_metadata(MediaMetadata::default());
        extractor.probe = Err(stderr.to_string());
        extractor
    }

    pub fn video(mut self, script: FetchScript) -> Self {
        self.video = script;
        self
    }

    pub fn audio(mut self, script: FetchScript) -> Self {
        self.audio = script;
        self
    }

    pub fn without_ffmpeg(mut self) -> Self {
        self.ffmpeg = false;
        self
    }

    pub fn fetched(&self) -> Vec<FetchRequest> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaExtractor for ScriptedExtractor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn probe(&self, _url: &str) -> Result<MediaMetadata, ExtractionError> {
        tokio::task::yield_now().await;
        self.probe
            .clone()
            .map_err(|stderr| ExtractionError::from_stderr("yt-dlp", Some(1), &stderr))
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        hook: &(dyn Fn(FetchEvent) + Send + Sync),
    ) -> Result<FetchOutput, ExtractionError> {
        self.fetched.lock().unwrap().push(request.clone());
        let script = match request.kind {
            FetchKind::Video { .. } => &self.video,
            FetchKind::Audio => &self.audio,
        };

        tokio::task::yield_now().await;
        match script {
            FetchScript::Succeed { ticks, file } => {
                for (downloaded, total) in ticks {
                    hook(FetchEvent::Downloading {
                        downloaded: *downloaded,
                        total: *total,
                    });
                }
                hook(FetchEvent::Finished);
                Ok(FetchOutput {
                    files: file.iter().cloned().collect(),
                })
            }
            FetchScript::Fail(stderr) => Err(ExtractionError::from_stderr("yt-dlp", Some(1), stderr)),
        }
    }

    async fn post_processor_available(&self) -> bool {
        self.ffmpeg
    }
}
