//! Product review types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use novare_core::{ProductId, ReviewId, UserId};

/// Longest accepted review comment, in characters.
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// A product review with the reviewer's username.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub username: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated rating and comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewInput {
    pub rating: i16,
    pub comment: String,
}

impl ReviewInput {
    /// Validate a rating (1-5) and a non-empty comment.
    ///
    /// # Errors
    ///
    /// Returns a message describing the invalid field.
    pub fn new(rating: i16, comment: &str) -> Result<Self, String> {
        if !(1..=5).contains(&rating) {
            return Err("rating must be between 1 and 5".to_owned());
        }
        let comment = comment.trim();
        if comment.is_empty() {
            return Err("comment is required".to_owned());
        }
        if comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(format!(
                "comment must be at most {MAX_COMMENT_LENGTH} characters"
            ));
        }
        Ok(Self {
            rating,
            comment: comment.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(ReviewInput::new(0, "meh").is_err());
        assert!(ReviewInput::new(6, "wow").is_err());
        assert!(ReviewInput::new(5, "great fit").is_ok());
    }

    #[test]
    fn test_comment_is_trimmed_and_required() {
        assert!(ReviewInput::new(4, "   ").is_err());
        let input = ReviewInput::new(4, "  soft fabric ").ok();
        assert_eq!(input.map(|i| i.comment), Some("soft fabric".to_owned()));
    }

    #[test]
    fn test_comment_length_limit() {
        let long = "a".repeat(MAX_COMMENT_LENGTH + 1);
        assert!(ReviewInput::new(3, &long).is_err());
    }
}
