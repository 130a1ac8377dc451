// Runtime configuration: output directories and yt-dlp pass-through options

use std::path::{Path, PathBuf};

use crate::downloader::errors::ConfigError;

/// Output filename template, relative to the target directory
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

const APP_DIR: &str = "ytgrab";

/// Where finished files land
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirs {
    pub video_dir: PathBuf,
    pub audio_dir: PathBuf,
}

impl OutputDirs {
    /// `videos/` and `audios/` under `root`
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            video_dir: root.join("videos"),
            audio_dir: root.join("audios"),
        }
    }

    /// `<download dir>/ytgrab/{videos,audios}`, falling back to the home
    /// directory and then the working directory
    pub fn system_default() -> Self {
        let base = dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::under(base.join(APP_DIR))
    }

    /// Create both directories; calling it again is a no-op
    pub fn ensure_exists(&self) -> Result<(), ConfigError> {
        for dir in [&self.video_dir, &self.audio_dir] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn video_template(&self) -> String {
        template_in(&self.video_dir)
    }

    pub fn audio_template(&self) -> String {
        template_in(&self.audio_dir)
    }
}

impl Default for OutputDirs {
    fn default() -> Self {
        Self::system_default()
    }
}

fn template_in(dir: &Path) -> String {
    dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned()
}

/// Everything the extractor and the session need to know up front
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub output: OutputDirs,
    /// Explicit yt-dlp binary; discovered when absent
    pub ytdlp_path: Option<PathBuf>,
    /// Explicit ffmpeg binary, also handed to yt-dlp as `--ffmpeg-location`
    pub ffmpeg_path: Option<PathBuf>,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Netscape cookies.txt file
    pub cookies_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(output: OutputDirs) -> Self {
        Self {
            output,
            ..Default::default()
        }
    }

    pub fn with_video_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.output.video_dir = dir;
        }
        self
    }

    pub fn with_audio_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.output.audio_dir = dir;
        }
        self
    }

    pub fn with_ytdlp_path(mut self, path: Option<PathBuf>) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_ffmpeg_path(mut self, path: Option<PathBuf>) -> Self {
        self.ffmpeg_path = path;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_cookies_path(mut self, path: Option<PathBuf>) -> Self {
        self.cookies_path = path;
        self
    }
}
