use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Attachment;

const SUPPORTED_MIME_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "text/csv",
    "application/pdf",
    "text/html",
    "application/json",
    "text/javascript",
    "text/css",
    "text/xml",
];

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "pdf", "html", "json", "js", "css", "xml", "py", "jsx", "tsx", "ts",
    "java", "cpp", "c", "h", "hpp", "go", "rs", "rb", "php", "sh", "yaml", "yml",
];

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Unsupported file type for {name}: {mime_type}")]
    Unsupported { name: String, mime_type: String },

    #[error("Failed to read {name}: {reason}")]
    ReadFailed { name: String, reason: String },
}

/// A file the user picked but that has not been read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: PathBuf,
    pub name: String,
    pub mime_type: Option<String>,
}

impl PendingFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            mime_type: None,
        }
    }
}

/// Turns a picked file into decoded text.
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read_text(&self, file: &PendingFile) -> Result<String, String>;
}

/// Reads from the local filesystem. PDFs are reduced to their text layer;
/// everything else must be valid UTF-8.
pub struct FsReader;

#[async_trait]
impl FileReader for FsReader {
    async fn read_text(&self, file: &PendingFile) -> Result<String, String> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| e.to_string())?;

        if is_pdf(&file.name, file.mime_type.as_deref()) {
            return tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|e| format!("PDF parse error: {}", e))
            })
            .await
            .map_err(|e| e.to_string())?;
        }

        String::from_utf8(bytes).map_err(|_| "file is not valid UTF-8 text".to_string())
    }
}

fn is_pdf(name: &str, mime_type: Option<&str>) -> bool {
    mime_type == Some("application/pdf")
        || Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

pub fn is_supported(name: &str, mime_type: Option<&str>) -> bool {
    if mime_type.is_some_and(|m| SUPPORTED_MIME_TYPES.contains(&m)) {
        return true;
    }

    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Validate every file up front, then read them in order. Any failure
/// discards the whole batch.
pub async fn load_batch(
    files: &[PendingFile],
    reader: &dyn FileReader,
) -> Result<Vec<Attachment>, AttachmentError> {
    if let Some(bad) = files
        .iter()
        .find(|f| !is_supported(&f.name, f.mime_type.as_deref()))
    {
        return Err(AttachmentError::Unsupported {
            name: bad.name.clone(),
            mime_type: bad.mime_type.clone().unwrap_or_else(|| "unknown".to_string()),
        });
    }

    let mut attachments = Vec::with_capacity(files.len());
    for file in files {
        let content = reader
            .read_text(file)
            .await
            .map_err(|reason| AttachmentError::ReadFailed {
                name: file.name.clone(),
                reason,
            })?;
        attachments.push(Attachment::new(file.name.clone(), content));
    }

    tracing::debug!("Loaded {} attachment(s)", attachments.len());
    Ok(attachments)
}
