use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::AssetsConfig;

#[derive(Debug)]
pub enum AssetError {
    Empty,
    TooLarge { size: usize, max: usize },
    UnsupportedType(String),
    Io(std::io::Error),
}

impl std::fmt::Display for AssetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty upload"),
            Self::TooLarge { size, max } => {
                write!(f, "upload too large: {size} bytes (max {max})")
            },
            Self::UnsupportedType(t) => write!(f, "unsupported content type: {t}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for AssetError {}

impl From<std::io::Error> for AssetError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Map an image content type to the file extension it is stored under.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Disk-backed store for uploaded puzzle images.
///
/// Files are written under `dir` with random names and addressed publicly as
/// `<public_prefix>/<file>`. A reset deletes the files published before it;
/// leftovers from earlier runs are cleared at startup.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
    public_prefix: String,
    max_bytes: usize,
}

impl AssetStore {
    pub fn new(config: &AssetsConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.dir),
            public_prefix: config.public_prefix.clone(),
            max_bytes: config.max_upload_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an uploaded image and return the URL it is served under.
    pub async fn publish(&self, data: &[u8], content_type: &str) -> Result<String, AssetError> {
        if data.is_empty() {
            return Err(AssetError::Empty);
        }
        if data.len() > self.max_bytes {
            return Err(AssetError::TooLarge {
                size: data.len(),
                max: self.max_bytes,
            });
        }
        let ext = extension_for(content_type)
            .ok_or_else(|| AssetError::UnsupportedType(content_type.to_string()))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = format!("{}.{ext}", Uuid::new_v4());
        tokio::fs::write(self.dir.join(&file_name), data).await?;

        tracing::info!(file = %file_name, bytes = data.len(), "Stored asset");
        Ok(format!("{}/{file_name}", self.public_prefix))
    }

    /// Delete the stored files behind `urls`. URLs outside the public prefix
    /// or naming anything but a plain file in the store are skipped. Returns
    /// how many files were removed; failures are logged and skipped.
    pub async fn delete_urls(&self, urls: &[String]) -> usize {
        let mut removed = 0;
        for url in urls {
            let Some(file_name) = self.file_name_for(url) else {
                tracing::debug!(url = %url, "Not a stored asset, skipping delete");
                continue;
            };
            match tokio::fs::remove_file(self.dir.join(file_name)).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(e) => tracing::warn!(url = %url, error = %e, "Failed to delete asset"),
            }
        }
        removed
    }

    fn file_name_for<'a>(&self, url: &'a str) -> Option<&'a str> {
        let file_name = url
            .strip_prefix(self.public_prefix.as_str())?
            .strip_prefix('/')?;
        let plain = !file_name.is_empty()
            && !file_name.contains(['/', '\\'])
            && !file_name.starts_with('.');
        plain.then_some(file_name)
    }

    /// Delete every stored file. Keeps going past individual failures and
    /// reports the last one. A missing directory counts as already empty.
    pub async fn delete_all(&self) -> Result<usize, AssetError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        let mut last_error = None;
        while let Some(entry) = entries.next_entry().await? {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Failed to delete asset");
                    last_error = Some(e);
                },
            }
        }

        match last_error {
            Some(e) => Err(e.into()),
            None => Ok(removed),
        }
    }
}
