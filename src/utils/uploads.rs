//! Local-disk storage for uploaded report files.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::AppResult,
    model::file_upload::{IncomingFile, StoredFile},
};

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `file` under `<root>/<category>/` with a collision-free name.
    pub async fn persist(&self, category: &str, file: &IncomingFile) -> AppResult<StoredFile> {
        let dir = self.root.join(category);
        tokio::fs::create_dir_all(&dir).await?;

        let stored_name = format!(
            "{}_{}",
            Uuid::new_v4().to_simple(),
            sanitize_filename(&file.original_name)
        );
        let path = dir.join(&stored_name);

        tokio::fs::write(&path, &file.bytes).await?;
        debug!(path = %path.display(), size = file.bytes.len(), "Stored upload");

        Ok(StoredFile {
            original_name: file.original_name.clone(),
            stored_name,
            path,
            mime_type: file.mime_type.clone(),
            size_bytes: file.bytes.len() as u64,
        })
    }

    /// Best-effort removal of a file whose database row was never written.
    pub async fn discard(&self, file: &StoredFile) {
        if let Err(e) = tokio::fs::remove_file(&file.path).await {
            warn!(error = %e, path = %file.path.display(), "Failed to remove orphaned upload");
        }
    }
}

/// Keeps the last path component and replaces anything outside
/// `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}
