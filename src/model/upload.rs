use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A raw file payload waiting to be uploaded.
///
/// The bytes are never serialized; a working copy written to disk keeps the
/// `source` path instead, and [`Upload::load_data`] reads the bytes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
            source: None,
        }
    }

    /// Reads a file from disk, guessing the content type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            file_name,
            content_type: content_type_for(path).to_string(),
            data,
            source: Some(path.to_path_buf()),
        })
    }

    /// Fills `data` from `source` when the bytes were not kept in memory.
    pub async fn load_data(&mut self) -> std::io::Result<()> {
        if !self.data.is_empty() {
            return Ok(());
        }
        if let Some(source) = &self.source {
            self.data = tokio::fs::read(source).await?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// MIME type for a file name, based on its extension only.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
