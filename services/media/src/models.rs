use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Fields read from `ffprobe` output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub format: Option<String>,
}

impl MediaMetadata {
    /// Duration rounded to whole seconds, zero when unknown
    pub fn duration_seconds(&self) -> i32 {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as i32)
            .unwrap_or(0)
    }
}

/// Post-upload work item; lives only in the processing queue
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub video_id: Uuid,
    pub filename: String,
    pub file_path: PathBuf,
}

/// Result of a successful processing run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedMedia {
    pub thumbnail_url: String,
    pub duration_seconds: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_rounding() {
        let meta = |d| MediaMetadata {
            duration: d,
            ..Default::default()
        };
        assert_eq!(meta(Some(12.6)).duration_seconds(), 13);
        assert_eq!(meta(Some(12.4)).duration_seconds(), 12);
        assert_eq!(meta(None).duration_seconds(), 0);
        assert_eq!(meta(Some(f64::NAN)).duration_seconds(), 0);
    }
}
