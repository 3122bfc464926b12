//! Post-upload processing step run by the queue

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    error::MediaResult,
    metadata_extractor::MetadataExtractor,
    models::{ProcessedMedia, ProcessingJob},
    storage::StorageBackend,
    thumbnail_generator::ThumbnailGenerator,
};

/// Produces a thumbnail and duration for an uploaded video
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    async fn process(&self, job: &ProcessingJob) -> MediaResult<ProcessedMedia>;
}

/// Default processor shelling out to `ffprobe` and `ffmpeg`
pub struct FfmpegProcessor {
    storage: Arc<dyn StorageBackend>,
    thumbnails: ThumbnailGenerator,
}

impl FfmpegProcessor {
    pub fn new(storage: Arc<dyn StorageBackend>, thumbnails: ThumbnailGenerator) -> Self {
        Self {
            storage,
            thumbnails,
        }
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn process(&self, job: &ProcessingJob) -> MediaResult<ProcessedMedia> {
        let metadata = MetadataExtractor::extract_metadata(&job.file_path).await?;
        let midpoint = metadata.duration.unwrap_or(0.0) / 2.0;

        let thumbnail = self
            .thumbnails
            .generate_thumbnail(&job.file_path, &job.filename, midpoint)
            .await?;

        Ok(ProcessedMedia {
            thumbnail_url: self.storage.file_url(&thumbnail),
            duration_seconds: metadata.duration_seconds(),
        })
    }
}
