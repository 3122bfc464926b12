//! Container signature checks for uploaded files

use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::warn;

use crate::{
    error::{MediaError, MediaResult},
    storage::StorageBackend,
};

const HEADER_LEN: usize = 12;
const FTYP: &[u8] = b"ftyp";
const RIFF: &[u8] = b"RIFF";
const EBML: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];
const QUICKTIME_BRAND: &[u8] = b"qt  ";

/// Header bytes needed before a container can be recognised
pub const SIGNATURE_LEN: usize = HEADER_LEN;

/// Whether the leading bytes look like a video container
///
/// Accepts an ISO base media `ftyp` box anywhere in the header (MP4/MOV),
/// a `RIFF` prefix (AVI) or an EBML prefix (WebM/MKV).
pub fn has_video_signature(header: &[u8]) -> bool {
    let header = &header[..header.len().min(HEADER_LEN)];

    header.windows(FTYP.len()).any(|w| w == FTYP)
        || header.starts_with(RIFF)
        || header.starts_with(EBML)
}

/// File extension for the container the header starts, if any
pub fn container_extension(header: &[u8]) -> Option<&'static str> {
    let header = &header[..header.len().min(HEADER_LEN)];

    if let Some(at) = header.windows(FTYP.len()).position(|w| w == FTYP) {
        let brand = header.get(at + FTYP.len()..at + FTYP.len() + 4);
        return Some(if brand == Some(QUICKTIME_BRAND) { "mov" } else { "mp4" });
    }
    if header.starts_with(RIFF) {
        return Some("avi");
    }
    if header.starts_with(EBML) {
        return Some("webm");
    }
    None
}

/// Read the header of a file on disk and check its signature
pub async fn validate_video_file(path: &Path) -> MediaResult<bool> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    (&mut file)
        .take(HEADER_LEN as u64)
        .read_to_end(&mut header)
        .await?;

    Ok(has_video_signature(&header))
}

/// Validate a stored upload, deleting it when it is not a video
pub async fn validate_or_discard(storage: &dyn StorageBackend, filename: &str) -> MediaResult<()> {
    let path = storage.local_path(filename)?;

    let valid = match validate_video_file(&path).await {
        Ok(valid) => valid,
        Err(e) => {
            warn!("Could not read upload {}: {}", filename, e);
            false
        }
    };

    if valid {
        return Ok(());
    }

    if let Err(e) = storage.delete(filename).await {
        warn!("Failed to delete rejected upload {}: {}", filename, e);
    }
    Err(MediaError::InvalidVideo)
}
