//! ytgrab: inspect the formats of a video URL and download a progressive MP4
//! and/or an MP3 track, with all extraction delegated to yt-dlp.

pub mod cli;
pub mod config;
pub mod downloader;
pub mod session;
pub mod shell;

pub use config::{AppConfig, OutputDirs};
pub use session::{Controller, Notice, Session, SessionState};
