use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImagePathError {
    #[error("image path is empty")]
    Empty,
    #[error("image path {0} is outside the image root")]
    OutsideRoot(String),
}

/// The only directory batch requests may read images from.
#[derive(Debug, Clone)]
pub struct ImageRoot {
    root: PathBuf,
}

impl ImageRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a client-supplied path onto a file under the root.
    ///
    /// Relative paths are taken relative to the root. Paths that do not exist yet are
    /// accepted when they sit under the root lexically, and come out as absent views.
    pub async fn resolve(&self, requested: &str) -> Result<PathBuf, ImagePathError> {
        if requested.trim().is_empty() {
            return Err(ImagePathError::Empty);
        }

        let requested_path = Path::new(requested);
        let outside = || ImagePathError::OutsideRoot(requested.to_string());

        if requested_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(outside());
        }

        let root = tokio::fs::canonicalize(&self.root)
            .await
            .unwrap_or_else(|_| self.root.clone());
        let candidate = if requested_path.is_absolute() {
            requested_path.to_path_buf()
        } else {
            root.join(requested_path)
        };
        if !candidate.starts_with(&root) {
            return Err(outside());
        }

        // Symlinks inside the root must not lead out of it
        match tokio::fs::canonicalize(&candidate).await {
            Ok(real) if real.starts_with(&root) => Ok(real),
            Ok(_) => Err(outside()),
            Err(_) => Ok(candidate),
        }
    }

    pub async fn resolve_all(&self, requested: &[String]) -> Result<Vec<PathBuf>, ImagePathError> {
        let mut resolved = Vec::with_capacity(requested.len());
        for path in requested {
            resolved.push(self.resolve(path).await?);
        }
        Ok(resolved)
    }
}
