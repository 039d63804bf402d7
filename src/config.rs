use std::path::{Path, PathBuf};

use crate::ffmpeg::Tool;

/// Locations of the external executables.
///
/// Defaults to resolving `ffmpeg` and `ffprobe` through `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl ToolConfig {
    pub fn new(ffmpeg: Option<PathBuf>, ffprobe: Option<PathBuf>) -> Self {
        let defaults = ToolConfig::default();
        ToolConfig {
            ffmpeg: ffmpeg.unwrap_or(defaults.ffmpeg),
            ffprobe: ffprobe.unwrap_or(defaults.ffprobe),
        }
    }

    pub fn program(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Ffmpeg => &self.ffmpeg,
            Tool::Ffprobe => &self.ffprobe,
        }
    }
}
