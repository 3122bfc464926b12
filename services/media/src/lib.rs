//! Upload storage and the post-upload processing pipeline

pub mod error;
pub mod metadata_extractor;
pub mod models;
pub mod processor;
pub mod queue;
pub mod storage;
pub mod thumbnail_generator;
pub mod validator;

pub use error::{MediaError, MediaResult};
pub use models::{MediaMetadata, ProcessedMedia, ProcessingJob};
pub use processor::{FfmpegProcessor, MediaProcessor};
pub use queue::{PROCESSING_FAILED_REASON, ProcessingQueue, VideoStatusSink};
pub use storage::{LocalStorage, StorageBackend, generate_filename};
