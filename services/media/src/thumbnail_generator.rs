use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{error, info};

use crate::error::{MediaError, MediaResult};

const THUMBNAIL_WIDTH: u32 = 640;

#[derive(Clone)]
pub struct ThumbnailGenerator {
    output_dir: PathBuf,
}

impl ThumbnailGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Grab one frame at `at_seconds` and write it next to the uploads.
    /// Returns the thumbnail filename.
    pub async fn generate_thumbnail(
        &self,
        video_path: &Path,
        video_filename: &str,
        at_seconds: f64,
    ) -> MediaResult<String> {
        info!("Generating thumbnail for video: {}", video_filename);

        let thumbnail_name = Self::thumbnail_filename(video_filename);
        let thumbnail_path = self.output_dir.join(&thumbnail_name);

        let output = Command::new("ffmpeg")
            .arg("-y")
            .arg("-ss")
            .arg(format!("{:.3}", at_seconds.max(0.0)))
            .arg("-i")
            .arg(video_path)
            .arg("-frames:v")
            .arg("1")
            .arg("-vf")
            .arg(format!("scale={}:-2", THUMBNAIL_WIDTH))
            .arg(&thumbnail_path)
            .output()
            .await?;

        if !output.status.success() {
            error!("FFmpeg failed with status: {:?}", output.status);
            return Err(MediaError::Tool {
                tool: "ffmpeg",
                message: String::from_utf8_lossy(&output.stderr)
                    .lines()
                    .last()
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        Ok(thumbnail_name)
    }

    /// `thumb-<stem>.png` for a stored video name
    pub fn thumbnail_filename(video_filename: &str) -> String {
        let stem = Path::new(video_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(video_filename);
        format!("thumb-{}.png", stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_filename() {
        assert_eq!(
            ThumbnailGenerator::thumbnail_filename("3f2a.mp4"),
            "thumb-3f2a.png"
        );
        assert_eq!(
            ThumbnailGenerator::thumbnail_filename("noext"),
            "thumb-noext.png"
        );
    }
}
