use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fs;
use std::path::PathBuf;

use crate::error::ScreenshotError;

/// Writes screenshots returned by the computer tool to disk
///
/// Each screenshot is named after the tool use that produced it, so a repeated
/// id replaces the earlier file.
#[derive(Debug, Clone)]
pub struct ScreenshotSink {
    dir: PathBuf,
}

impl ScreenshotSink {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, tool_use_id: &str) -> PathBuf {
        self.dir.join(format!("screenshot_{}.png", tool_use_id))
    }

    pub fn save(&self, base64_image: &str, tool_use_id: &str) -> Result<PathBuf, ScreenshotError> {
        fs::create_dir_all(&self.dir)?;
        let bytes = STANDARD.decode(base64_image)?;

        let path = self.path_for(tool_use_id);
        fs::write(&path, bytes)?;
        tracing::info!("Saved screenshot: {}", path.display());
        Ok(path)
    }
}
