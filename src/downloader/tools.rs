// External tool discovery (yt-dlp and its ffmpeg post-processor)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg takes a single dash
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

/// Finds tools: explicit path first, then common install paths, then `PATH`
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    ytdlp_override: Option<PathBuf>,
    ffmpeg_override: Option<PathBuf>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ytdlp_override: config.ytdlp_path.clone(),
            ffmpeg_override: config.ffmpeg_path.clone(),
        }
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.locate(tool_type);
        let version = path.as_deref().and_then(|p| get_version(p, tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            is_available: path.is_some(),
            version,
            path,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::Ffmpeg),
        ]
    }

    /// Absolute path of a tool, if one can be found
    pub fn locate(&self, tool_type: ToolType) -> Option<PathBuf> {
        let explicit = match tool_type {
            ToolType::YtDlp => self.ytdlp_override.as_ref(),
            ToolType::Ffmpeg => self.ffmpeg_override.as_ref(),
        };
        if let Some(path) = explicit {
            if path.exists() {
                return Some(path.clone());
            }
            tracing::warn!(tool = tool_type.as_str(), path = %path.display(), "configured tool path does not exist");
        }

        let binary_name = tool_type.as_str();

        // 1. Common install locations
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];
        if let Some(found) = common_paths.iter().map(PathBuf::from).find(|p| p.exists()) {
            return Some(found);
        }

        // 2. PATH
        match Command::new("which").arg(binary_name).output() {
            Ok(output) if output.status.success() => {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!path.is_empty()).then(|| PathBuf::from(path))
            }
            _ => None,
        }
    }

    /// Program to invoke for yt-dlp; the bare name when nothing was found,
    /// so the spawn error names the missing tool
    pub fn ytdlp_program(&self) -> PathBuf {
        self.locate(ToolType::YtDlp)
            .unwrap_or_else(|| PathBuf::from(ToolType::YtDlp.as_str()))
    }

    /// ffmpeg can be found and runs
    pub fn ffmpeg_available(&self) -> bool {
        self.locate(ToolType::Ffmpeg)
            .map_or(false, |p| get_version(&p, ToolType::Ffmpeg).is_some())
    }
}

fn get_version(path: &Path, tool_type: ToolType) -> Option<String> {
    match Command::new(path).arg(tool_type.version_arg()).output() {
        Ok(output) if output.status.success() => {
            let out = String::from_utf8_lossy(&output.stdout);
            parse_version(tool_type, &out)
        }
        Ok(output) => {
            tracing::debug!(tool = tool_type.as_str(), status = %output.status, "version check failed");
            None
        }
        Err(e) => {
            tracing::debug!(tool = tool_type.as_str(), error = %e, "version check could not run");
            None
        }
    }
}

/// yt-dlp prints the bare version; ffmpeg prints a banner whose first line
/// is `ffmpeg version <v> Copyright ...`
fn parse_version(tool_type: ToolType, output: &str) -> Option<String> {
    let first = output.lines().next()?.trim();
    if first.is_empty() {
        return None;
    }

    match tool_type {
        ToolType::YtDlp => Some(first.to_string()),
        ToolType::Ffmpeg => first
            .strip_prefix("ffmpeg version ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
            .or_else(|| Some(first.to_string())),
    }
}
