use std::path::Path;
use tokio::process::Command;
use tracing::{error, info};

use crate::{
    error::{MediaError, MediaResult},
    models::MediaMetadata,
};

pub struct MetadataExtractor;

impl MetadataExtractor {
    pub async fn extract_metadata(file_path: &Path) -> MediaResult<MediaMetadata> {
        info!("Extracting metadata from file: {}", file_path.display());

        // Run ffprobe to get metadata in JSON format
        let output = Command::new("ffprobe")
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(file_path)
            .output()
            .await?;

        if !output.status.success() {
            error!("ffprobe failed with status: {:?}", output.status);
            return Err(MediaError::Tool {
                tool: "ffprobe",
                message: format!("exit status {:?}", output.status.code()),
            });
        }

        let ffprobe_data: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        Ok(Self::parse_ffprobe_output(&ffprobe_data))
    }

    pub(crate) fn parse_ffprobe_output(ffprobe_data: &serde_json::Value) -> MediaMetadata {
        let mut metadata = MediaMetadata::default();

        if let Some(format) = ffprobe_data.get("format") {
            metadata.duration = format
                .get("duration")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok());

            metadata.format = format
                .get("format_name")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }

        let streams = ffprobe_data
            .get("streams")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();

        for stream in streams {
            let codec_name = stream
                .get("codec_name")
                .and_then(|v| v.as_str())
                .map(str::to_string);

            match stream.get("codec_type").and_then(|v| v.as_str()) {
                Some("video") if metadata.video_codec.is_none() => {
                    metadata.width = stream.get("width").and_then(|v| v.as_i64()).map(|w| w as i32);
                    metadata.height = stream
                        .get("height")
                        .and_then(|v| v.as_i64())
                        .map(|h| h as i32);
                    metadata.video_codec = codec_name;
                }
                Some("audio") if metadata.audio_codec.is_none() => {
                    metadata.audio_codec = codec_name;
                }
                _ => {}
            }
        }

        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ffprobe_output() {
        let data = json!({
            "format": { "duration": "61.534000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2" },
            "streams": [
                { "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080 },
                { "codec_type": "audio", "codec_name": "aac" },
                { "codec_type": "video", "codec_name": "mjpeg", "width": 320, "height": 240 }
            ]
        });

        let metadata = MetadataExtractor::parse_ffprobe_output(&data);

        assert_eq!(metadata.duration_seconds(), 62);
        assert_eq!(metadata.width, Some(1920));
        assert_eq!(metadata.video_codec.as_deref(), Some("h264"));
        assert_eq!(metadata.audio_codec.as_deref(), Some("aac"));
    }

    #[test]
    fn test_missing_sections() {
        let metadata = MetadataExtractor::parse_ffprobe_output(&json!({}));
        assert!(metadata.duration.is_none());
        assert_eq!(metadata.duration_seconds(), 0);
    }
}
