use std::fs;
use std::path::PathBuf;

use notif_core::enrichment::ImageFetcher;
use notif_core::error::FetchError;
use notif_core::platform::Bitmap;

/// Loads notification images from the local filesystem (`file://` urls or plain paths).
#[derive(Debug, Default)]
pub struct FileImageFetcher;

impl FileImageFetcher {
    fn resolve(url: &str) -> Result<PathBuf, FetchError> {
        let url = url.trim();
        if let Some(path) = url.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        if url.contains("://") {
            return Err(FetchError::UnsupportedUrl(url.to_string()));
        }
        Ok(PathBuf::from(url))
    }
}

impl ImageFetcher for FileImageFetcher {
    fn fetch(&self, url: &str) -> Result<Bitmap, FetchError> {
        let path = Self::resolve(url)?;
        let bytes = fs::read(&path)
            .map_err(|err| FetchError::Download(format!("{}: {err}", path.display())))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "image loaded");
        Ok(Bitmap { bytes })
    }
}
