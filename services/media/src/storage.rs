//! Storage abstraction for uploaded media
//!
//! Files are addressed by a server-generated name (`<uuid>.<ext>`). The
//! backend maps that name to a local path for processing and to a public URL
//! for clients.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWrite;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{MediaError, MediaResult},
    validator::container_extension,
};

/// Container extensions accepted for uploads
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "mkv"];

/// Storage backend trait
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Open a fresh file for writing under `filename`
    async fn create(&self, filename: &str) -> MediaResult<Box<dyn AsyncWrite + Send + Unpin>>;

    /// Delete a file; a missing file is not an error
    async fn delete(&self, filename: &str) -> MediaResult<()>;

    /// Public URL for a stored file
    fn file_url(&self, filename: &str) -> String;

    /// Local path used by the processing pipeline
    fn local_path(&self, filename: &str) -> MediaResult<PathBuf>;

    /// Reverse of `file_url`; `None` for URLs this backend did not issue
    fn filename_from_url(&self, url: &str) -> Option<String>;
}

/// Generate a server-side filename for an upload starting with `header`
///
/// A whitelisted extension on the client-supplied name is kept; otherwise the
/// extension follows the detected container. A file that is neither is not a
/// video.
pub fn generate_filename(original_name: Option<&str>, header: &[u8]) -> MediaResult<String> {
    let extension = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .or_else(|| container_extension(header).map(str::to_string))
        .ok_or(MediaError::InvalidVideo)?;

    Ok(format!("{}.{}", Uuid::new_v4(), extension))
}

fn check_filename(filename: &str) -> MediaResult<()> {
    let plain = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\'])
        && !filename.contains('\0');

    if plain {
        Ok(())
    } else {
        Err(MediaError::InvalidFileName(filename.to_string()))
    }
}

/// Local filesystem storage backend
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create the upload directory if needed
    pub async fn ensure_dir(&self) -> MediaResult<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        info!("Upload directory ready at {}", self.base_path.display());
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn create(&self, filename: &str) -> MediaResult<Box<dyn AsyncWrite + Send + Unpin>> {
        let path = self.local_path(filename)?;
        let file = tokio::fs::File::create(&path).await?;
        Ok(Box::new(file))
    }

    async fn delete(&self, filename: &str) -> MediaResult<()> {
        let path = self.local_path(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("File {} already gone", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn file_url(&self, filename: &str) -> String {
        format!("{}/{}", self.base_url, filename)
    }

    fn local_path(&self, filename: &str) -> MediaResult<PathBuf> {
        check_filename(filename)?;
        Ok(self.base_path.join(filename))
    }

    fn filename_from_url(&self, url: &str) -> Option<String> {
        let name = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        check_filename(name).ok()?;
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;
    use tokio_test::{assert_err, assert_ok};

    fn storage(dir: &TempDir) -> LocalStorage {
        LocalStorage::new(dir.path(), "/uploads/")
    }

    const MP4_HEADER: &[u8] = b"\0\0\0\x18ftypmp42";

    #[test]
    fn test_generated_names_drop_client_stem() {
        let name = generate_filename(Some("../../etc/My Video.MP4"), MP4_HEADER).unwrap();
        assert!(name.ends_with(".mp4"));
        assert!(!name.contains("My Video"));
        assert!(Uuid::parse_str(name.trim_end_matches(".mp4")).is_ok());
    }

    #[test]
    fn test_whitelisted_extension_is_kept() {
        let name = generate_filename(Some("clip.webm"), b"").unwrap();
        assert!(name.ends_with(".webm"));
    }

    #[test]
    fn test_other_extensions_follow_the_container() {
        let m4v = generate_filename(Some("clip.m4v"), MP4_HEADER).unwrap();
        assert!(m4v.ends_with(".mp4"));

        let bare = generate_filename(None, b"RIFF\0\0\0\0AVI ").unwrap();
        assert!(bare.ends_with(".avi"));

        let unnamed = generate_filename(Some("noextension"), &[0x1A, 0x45, 0xDF, 0xA3]).unwrap();
        assert!(unnamed.ends_with(".webm"));
    }

    #[test]
    fn test_unknown_extension_and_content_is_not_a_video() {
        assert!(matches!(
            generate_filename(Some("clip.exe"), b"MZ\x90\0"),
            Err(MediaError::InvalidVideo)
        ));
        assert_err!(generate_filename(None, b""));
        assert_ok!(generate_filename(Some("clip.mov"), b""));
    }

    #[test]
    fn test_paths_stay_inside_base() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        assert_eq!(
            storage.local_path("a.mp4").unwrap(),
            dir.path().join("a.mp4")
        );
        assert_err!(storage.local_path("../a.mp4"));
        assert_err!(storage.local_path("sub/a.mp4"));
        assert_err!(storage.local_path(""));
    }

    #[test]
    fn test_url_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let url = storage.file_url("thumb-a.png");
        assert_eq!(url, "/uploads/thumb-a.png");
        assert_eq!(storage.filename_from_url(&url).as_deref(), Some("thumb-a.png"));
        assert_eq!(storage.filename_from_url("https://elsewhere/x.png"), None);
        assert_eq!(storage.filename_from_url("/uploads/../secret"), None);
    }

    #[tokio::test]
    async fn test_create_and_delete() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let mut writer = storage.create("a.mp4").await.unwrap();
        writer.write_all(b"data").await.unwrap();
        writer.shutdown().await.unwrap();
        drop(writer);

        assert!(dir.path().join("a.mp4").exists());
        assert_ok!(storage.delete("a.mp4").await);
        assert!(!dir.path().join("a.mp4").exists());

        // deleting twice is fine
        assert_ok!(storage.delete("a.mp4").await);
    }
}
