use anyhow::Context as _;
use report_fusion::ViewKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// An uploaded image held in memory until the request is fully read.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub view: ViewKind,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Uploaded images written to disk for the duration of one request.
///
/// Each request gets its own directory under the upload dir, so requests sharing a uid
/// never touch each other's files. The directory is removed when this is dropped,
/// whether the request succeeded or not.
#[derive(Debug)]
pub struct StagedUploads {
    dir: Option<TempDir>,
    frontal: Vec<PathBuf>,
    lateral: Vec<PathBuf>,
}

impl StagedUploads {
    pub async fn stage(dir: &Path, uid: &str, images: Vec<UploadedImage>) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;

        let request_dir = tempfile::Builder::new()
            .prefix(&format!("{}-", sanitize(uid)))
            .tempdir_in(dir)
            .with_context(|| format!("Failed to create request directory in {}", dir.display()))?;

        // From here on an early return drops `staged`, which removes everything written so far
        let mut staged = StagedUploads {
            frontal: Vec::new(),
            lateral: Vec::new(),
            dir: Some(request_dir),
        };
        let request_dir = staged.dir().to_path_buf();

        for image in images {
            let path = request_dir.join(format!(
                "{}_{}_{}",
                sanitize(uid),
                image.view.label().to_lowercase(),
                sanitize(&image.filename)
            ));
            tokio::fs::write(&path, &image.bytes)
                .await
                .with_context(|| format!("Failed to save upload {}", path.display()))?;
            debug!(path = %path.display(), bytes = image.bytes.len(), "Staged upload");

            match image.view {
                ViewKind::Frontal => staged.frontal.push(path),
                ViewKind::Lateral => staged.lateral.push(path),
            }
        }

        Ok(staged)
    }

    /// Directory holding this request's files.
    pub fn dir(&self) -> &Path {
        self.dir.as_ref().map_or(Path::new(""), TempDir::path)
    }

    pub fn frontal(&self) -> &[PathBuf] {
        &self.frontal
    }

    pub fn lateral(&self) -> &[PathBuf] {
        &self.lateral
    }
}

impl Drop for StagedUploads {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to remove staged uploads in {}: {}", path.display(), e);
            }
        }
    }
}

/// Keeps a client-supplied name to a single safe path component.
fn sanitize(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
