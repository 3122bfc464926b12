use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Words rejected in comments (case-insensitive substring match)
const BANNED_WORDS: &[&str] = &["badword", "spam", "offensive"];

const MAX_COMMENT_LEN: usize = 2000;

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub video_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub content: String,
}

impl NewComment {
    /// Trimmed content, or a validation error
    pub fn validated(&self) -> Result<&str, ApiError> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(ApiError::Validation("Comment cannot be empty".to_string()));
        }
        if content.chars().count() > MAX_COMMENT_LEN {
            return Err(ApiError::Validation("Comment is too long".to_string()));
        }
        if contains_banned_words(content) {
            return Err(ApiError::Validation(
                "Comment contains inappropriate language".to_string(),
            ));
        }
        Ok(content)
    }
}

pub fn contains_banned_words(text: &str) -> bool {
    let lower = text.to_lowercase();
    BANNED_WORDS.iter().any(|word| lower.contains(word))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RatingCounts {
    pub likes: i64,
    pub dislikes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banned_words_are_case_insensitive() {
        assert!(contains_banned_words("This is SPAM"));
        assert!(!contains_banned_words("lovely video"));
    }

    #[test]
    fn test_comment_validation() {
        let comment = |s: &str| NewComment {
            content: s.to_string(),
        };

        assert_eq!(comment("  nice  ").validated().unwrap(), "nice");
        assert!(comment("   ").validated().is_err());
        assert!(comment("buy spam now").validated().is_err());
        assert!(comment(&"a".repeat(2001)).validated().is_err());
    }
}
