// src/models/review.rs
use crate::error::{Result, ReviewError};
use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Store-assigned review identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(Uuid);

impl ReviewId {
    pub fn new() -> Self {
        ReviewId(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw.trim())
            .map(ReviewId)
            .map_err(|_| ReviewError::validation(format!("Invalid review id '{}'", raw)))
    }
}

impl Default for ReviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Star rating, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: i64) -> Result<Self> {
        if value < MIN_RATING {
            return Err(ReviewError::validation("Rating must be at least 1"));
        }
        if value > MAX_RATING {
            return Err(ReviewError::validation("Rating cannot exceed 5"));
        }
        Ok(Rating(value as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = ReviewError;

    fn try_from(value: i64) -> Result<Self> {
        Rating::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        rating.0 as i64
    }
}

/// Input for creating a review. Nothing here is trusted until
/// [`ReviewDraft::validate`] has accepted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub title: String,
    pub text: String,
    pub rating: i64,
    pub location: GeoPoint,
}

impl ReviewDraft {
    pub fn new(
        title: impl Into<String>,
        text: impl Into<String>,
        rating: i64,
        location: GeoPoint,
    ) -> Self {
        ReviewDraft {
            title: title.into(),
            text: text.into(),
            rating,
            location,
        }
    }

    pub fn validate(&self) -> Result<ReviewContent> {
        Ok(ReviewContent {
            title: normalize_title(&self.title)?,
            text: normalize_text(&self.text)?,
            rating: Rating::new(self.rating)?,
            location: self.location,
        })
    }
}

/// Partial update. `None` leaves the stored value untouched; `location`
/// always replaces the whole point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewPatch {
    pub title: Option<String>,
    pub text: Option<String>,
    pub rating: Option<i64>,
    pub location: Option<GeoPoint>,
}

impl ReviewPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.text.is_none() && self.rating.is_none() && self.location.is_none()
    }
}

/// The user-editable, validated part of a review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewContent {
    pub title: String,
    pub text: String,
    pub rating: Rating,
    pub location: GeoPoint,
}

impl ReviewContent {
    /// Merge `patch` over this content and validate the whole result.
    pub fn merge(&self, patch: &ReviewPatch) -> Result<ReviewContent> {
        let merged = ReviewDraft {
            title: patch.title.clone().unwrap_or_else(|| self.title.clone()),
            text: patch.text.clone().unwrap_or_else(|| self.text.clone()),
            rating: patch.rating.unwrap_or_else(|| i64::from(self.rating)),
            location: patch.location.unwrap_or(self.location),
        };
        merged.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub title: String,
    pub text: String,
    pub rating: Rating,
    pub location: GeoPoint,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn content(&self) -> ReviewContent {
        ReviewContent {
            title: self.title.clone(),
            text: self.text.clone(),
            rating: self.rating,
            location: self.location,
        }
    }
}

fn normalize_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ReviewError::validation("Review title is required"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ReviewError::validation("Title cannot exceed 100 characters"));
    }
    Ok(title.to_string())
}

fn normalize_text(raw: &str) -> Result<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ReviewError::validation("Review text is required"));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mumbai() -> GeoPoint {
        GeoPoint::new(72.8372, 19.0760).unwrap()
    }

    #[test]
    fn test_rating_bounds() {
        assert_eq!(Rating::new(1).unwrap().value(), 1);
        assert_eq!(Rating::new(5).unwrap().value(), 5);
        assert!(Rating::new(0).unwrap_err().is_validation());
        assert!(Rating::new(6).unwrap_err().is_validation());
    }

    #[test]
    fn test_rating_serde_is_a_plain_integer() {
        let rating = Rating::new(4).unwrap();
        assert_eq!(serde_json::to_string(&rating).unwrap(), "4");
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }

    #[test]
    fn test_draft_validation_trims() {
        let draft = ReviewDraft::new("  Beach  ", "\tlovely water\n", 5, mumbai());
        let content = draft.validate().unwrap();
        assert_eq!(content.title, "Beach");
        assert_eq!(content.text, "lovely water");
        // The caller's draft is left as it was.
        assert_eq!(draft.title, "  Beach  ");
    }

    #[test]
    fn test_title_limits() {
        let exact = "a".repeat(100);
        assert!(ReviewDraft::new(exact, "t", 3, mumbai()).validate().is_ok());

        let padded = format!("  {}  ", "b".repeat(100));
        assert!(ReviewDraft::new(padded, "t", 3, mumbai()).validate().is_ok());

        let long = "c".repeat(101);
        let err = ReviewDraft::new(long, "t", 3, mumbai()).validate().unwrap_err();
        assert_eq!(err.to_string(), "Title cannot exceed 100 characters");

        // Multi-byte characters count once each.
        let wide = "é".repeat(100);
        assert!(ReviewDraft::new(wide, "t", 3, mumbai()).validate().is_ok());
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert!(ReviewDraft::new("   ", "t", 3, mumbai()).validate().is_err());
        assert!(ReviewDraft::new("t", "  \n ", 3, mumbai()).validate().is_err());
    }

    #[test]
    fn test_merge_only_touches_supplied_fields() {
        let base = ReviewDraft::new("Fort", "Old walls", 4, mumbai())
            .validate()
            .unwrap();
        let delhi = GeoPoint::new(77.2090, 28.7041).unwrap();
        let patch = ReviewPatch {
            rating: Some(2),
            location: Some(delhi),
            ..Default::default()
        };
        let merged = base.merge(&patch).unwrap();
        assert_eq!(merged.title, "Fort");
        assert_eq!(merged.text, "Old walls");
        assert_eq!(merged.rating.value(), 2);
        assert_eq!(merged.location, delhi);
    }

    #[test]
    fn test_merge_rejects_invalid_result() {
        let base = ReviewDraft::new("Fort", "Old walls", 4, mumbai())
            .validate()
            .unwrap();
        let patch = ReviewPatch {
            rating: Some(6),
            ..Default::default()
        };
        assert!(base.merge(&patch).unwrap_err().is_validation());
        assert!(ReviewPatch::default().is_empty());
    }

    #[test]
    fn test_review_id_parse() {
        let id = ReviewId::new();
        assert_eq!(ReviewId::parse(&id.to_string()).unwrap(), id);
        assert!(ReviewId::parse("not-a-uuid").is_err());
    }
}
