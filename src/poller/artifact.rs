//! The retrieved file and its on-disk name.

use std::path::{Path, PathBuf};

/// Title used when the video title sanitizes to nothing.
pub const FALLBACK_TITLE: &str = "video_download";

/// Extension used when the format carries none.
pub const FALLBACK_EXTENSION: &str = "mp4";

/// A completed download held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Suggested file name, `{title}.{ext}`.
    pub file_name: String,
    /// `Content-Type` declared by the backend.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Creates an artifact named after `title` and `ext`.
    #[must_use]
    pub fn new(title: &str, ext: Option<&str>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: artifact_file_name(title, ext),
            content_type,
            bytes,
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the artifact has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Writes the artifact into `dir`, never overwriting an existing file.
    ///
    /// A taken name gets a numeric suffix: `Song.mp4`, `Song_2.mp4`, ...
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created or the file
    /// cannot be written.
    pub async fn save_to_dir(&self, dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = resolve_unique_path(dir, &self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Builds the file name for a downloaded video.
///
/// Strips `\ / : * ? " < > |` and control characters from the title and
/// trims surrounding whitespace. An empty result falls back to
/// [`FALLBACK_TITLE`]; a missing extension falls back to [`FALLBACK_EXTENSION`].
#[must_use]
pub fn artifact_file_name(title: &str, ext: Option<&str>) -> String {
    let stem = strip_reserved(title);
    let stem = if stem.is_empty() { FALLBACK_TITLE } else { stem.as_str() };

    let ext = ext
        .map(|e| strip_reserved(e).trim_start_matches('.').to_string())
        .filter(|e| !e.is_empty());
    let ext = ext.as_deref().unwrap_or(FALLBACK_EXTENSION);

    format!("{stem}.{ext}")
}

fn strip_reserved(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn resolve_unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let base = dir.join(file_name);
    if !base.exists() {
        return base;
    }

    let (stem, ext) = match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], &file_name[pos..]),
        _ => (file_name, ""),
    };

    for i in 2..1000 {
        let candidate = dir.join(format!("{stem}_{i}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}
