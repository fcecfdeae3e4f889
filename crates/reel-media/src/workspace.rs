//! Scoped render workspace.
//!
//! One render invocation owns one temporary directory; dropping the
//! workspace removes it on every exit path, including unwinds.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::fs;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Temporary working directory for one render.
pub struct RenderWorkspace {
    dir: TempDir,
}

impl RenderWorkspace {
    /// Create a fresh workspace.
    pub fn new() -> MediaResult<Self> {
        let dir = TempDir::with_prefix("storyreel-render-")?;
        debug!(path = %dir.path().display(), "created render workspace");
        Ok(Self { dir })
    }

    /// Workspace root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Narration audio target.
    pub fn audio_path(&self) -> PathBuf {
        self.dir.path().join("audio.mp3")
    }

    /// Scene still target, 1-based to match object keys.
    pub fn scene_image_path(&self, scene_index: usize) -> PathBuf {
        self.dir.path().join(format!("scene_{}.png", scene_index + 1))
    }

    /// Captions target.
    pub fn captions_path(&self) -> PathBuf {
        self.dir.path().join("captions.srt")
    }

    /// Concat manifest target.
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join("images.txt")
    }

    /// Final render target.
    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join("final_video.mp4")
    }

    /// Write the concat-demuxer manifest: each still with its display
    /// duration. The final entry is repeated because the demuxer ignores
    /// the last duration directive.
    pub async fn write_concat_manifest(
        &self,
        entries: &[(PathBuf, f64)],
    ) -> MediaResult<PathBuf> {
        let mut manifest = String::from("ffconcat version 1.0\n");
        for (path, duration) in entries {
            manifest.push_str(&format!(
                "file '{}'\nduration {:.3}\n",
                manifest_path_str(path),
                duration
            ));
        }
        if let Some((last, _)) = entries.last() {
            manifest.push_str(&format!("file '{}'\n", manifest_path_str(last)));
        }

        let target = self.manifest_path();
        fs::write(&target, manifest).await?;
        Ok(target)
    }

    /// Fail unless `path` exists and is non-empty.
    pub async fn validate_non_empty(&self, path: &Path) -> MediaResult<()> {
        match fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            Ok(_) => Err(MediaError::EmptyOutput(path.to_path_buf())),
            Err(_) => Err(MediaError::FileNotFound(path.to_path_buf())),
        }
    }
}

fn manifest_path_str(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").replace('\'', "'\\''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workspace_paths() {
        let ws = RenderWorkspace::new().unwrap();
        assert!(ws.audio_path().ends_with("audio.mp3"));
        assert!(ws.scene_image_path(0).ends_with("scene_1.png"));
        assert!(ws.scene_image_path(4).ends_with("scene_5.png"));
        assert!(ws.output_path().ends_with("final_video.mp4"));
    }

    #[tokio::test]
    async fn test_workspace_removed_on_drop() {
        let path;
        {
            let ws = RenderWorkspace::new().unwrap();
            path = ws.path().to_path_buf();
            fs::write(ws.audio_path(), b"bytes").await.unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_concat_manifest_repeats_last_entry() {
        let ws = RenderWorkspace::new().unwrap();
        let entries = vec![
            (ws.scene_image_path(0), 4.0),
            (ws.scene_image_path(1), 5.5),
        ];
        let manifest = ws.write_concat_manifest(&entries).await.unwrap();
        let content = fs::read_to_string(&manifest).await.unwrap();

        assert!(content.starts_with("ffconcat version 1.0"));
        assert_eq!(content.matches("scene_2.png").count(), 2);
        assert!(content.contains("duration 4.000"));
        assert!(content.contains("duration 5.500"));
    }

    #[tokio::test]
    async fn test_validate_non_empty() {
        let ws = RenderWorkspace::new().unwrap();
        let target = ws.audio_path();

        assert!(ws.validate_non_empty(&target).await.is_err());

        fs::write(&target, b"").await.unwrap();
        assert!(matches!(
            ws.validate_non_empty(&target).await,
            Err(MediaError::EmptyOutput(_))
        ));

        fs::write(&target, b"data").await.unwrap();
        assert!(ws.validate_non_empty(&target).await.is_ok());
    }
}
