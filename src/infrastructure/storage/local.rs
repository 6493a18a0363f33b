use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::StorageError;
use crate::constants::{ORIGINALS_DIR, THUMBNAILS_DIR};

const FALLBACK_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 10;

/// Originals and thumbnails on the local disk, both filed under the same
/// generated name.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        MediaStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dirs(&self) -> Result<(), StorageError> {
        for dir in [ORIGINALS_DIR, THUMBNAILS_DIR] {
            let path = self.root.join(dir);
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| StorageError::io(&path, e))?;
        }
        Ok(())
    }

    /// `{uuid}.{ext}` with the client's extension lower-cased, or `bin`
    /// when it has none worth keeping.
    pub fn new_file_name(client_name: Option<&str>) -> String {
        let extension = client_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

        format!("{}.{}", Uuid::new_v4(), extension)
    }

    pub fn original_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(ORIGINALS_DIR).join(checked(name)?))
    }

    pub fn thumbnail_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(THUMBNAILS_DIR).join(checked(name)?))
    }

    /// Copies an uploaded temp file into the originals directory,
    /// overwriting any file already stored under `name`.
    pub async fn store_original(&self, source: &Path, name: &str) -> Result<PathBuf, StorageError> {
        let target = self.original_path(name)?;
        tokio::fs::copy(source, &target)
            .await
            .map_err(|e| StorageError::io(&target, e))?;
        debug!(file = %target.display(), "original stored");
        Ok(target)
    }

    /// Removes both files stored under `name`. Failures are logged only.
    pub async fn remove(&self, name: &str) {
        self.remove_original(name).await;
        self.remove_thumbnail(name).await;
    }

    pub async fn remove_original(&self, name: &str) {
        match self.original_path(name) {
            Ok(path) => remove_logged(&path).await,
            Err(e) => warn!(error = %e, "refusing to remove file"),
        }
    }

    pub async fn remove_thumbnail(&self, name: &str) {
        match self.thumbnail_path(name) {
            Ok(path) => remove_logged(&path).await,
            Err(e) => warn!(error = %e, "refusing to remove file"),
        }
    }
}

async fn remove_logged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(file = %path.display(), error = %e, "failed to remove stored file");
    }
}

fn checked(name: &str) -> Result<&str, StorageError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0');

    if plain {
        Ok(name)
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_keep_lowercased_extension() {
        let name = MediaStorage::new_file_name(Some("Holiday.JPG"));
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "jpg");
        assert!(Uuid::parse_str(stem).is_ok());
    }

    #[test]
    fn missing_or_odd_extension_falls_back_to_bin() {
        assert!(MediaStorage::new_file_name(None).ends_with(".bin"));
        assert!(MediaStorage::new_file_name(Some("README")).ends_with(".bin"));
        assert!(MediaStorage::new_file_name(Some("x.j p g")).ends_with(".bin"));
    }

    #[test]
    fn path_traversal_is_rejected() {
        let storage = MediaStorage::new("static");
        assert!(storage.original_path("../secrets").is_err());
        assert!(storage.thumbnail_path("..").is_err());
        assert_eq!(
            storage.original_path("a.png").unwrap(),
            PathBuf::from("static").join(ORIGINALS_DIR).join("a.png")
        );
    }

    #[actix_rt::test]
    async fn store_and_remove_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path());
        storage.ensure_dirs().await.unwrap();

        let upload = dir.path().join("upload.tmp");
        std::fs::write(&upload, b"pixels").unwrap();

        let stored = storage.store_original(&upload, "x.png").await.unwrap();
        assert_eq!(std::fs::read(&stored).unwrap(), b"pixels");

        storage.remove("x.png").await;
        assert!(!stored.exists());
    }
}
