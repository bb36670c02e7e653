use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::models::{Document, Patch, Validate};
use crate::domain::services::api_features::{FieldKind, FieldSpec};
use crate::error::AppError;

#[derive(Debug, Serialize, FromRow, Clone)]
pub struct Review {
    pub id: String,
    pub review: String,
    pub rating: i32,
    pub tour_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow, Clone)]
pub struct ReviewAuthor {
    #[sqlx(rename = "author_name")]
    pub name: String,
    #[sqlx(rename = "author_photo")]
    pub photo: String,
}

/// A review as it is read back: with the author's public profile.
#[derive(Debug, Serialize, FromRow, Clone)]
pub struct ReviewWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    #[sqlx(flatten)]
    #[serde(rename = "user")]
    pub author: ReviewAuthor,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub review: String,
    pub rating: i32,
    pub tour_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ReviewPatch {
    pub review: Option<String>,
    pub rating: Option<i32>,
}

impl Review {
    pub fn new(input: &NewReview) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            review: input.review.trim().to_string(),
            rating: input.rating,
            tour_id: input.tour_id.clone(),
            user_id: input.user_id.clone(),
            created_at: Utc::now(),
        }
    }
}

fn validate_fields(review: &str, rating: i32) -> Result<(), AppError> {
    if review.trim().is_empty() {
        return Err(AppError::Validation("Review can not be empty!".into()));
    }
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation("Rating must be between 1 and 5".into()));
    }
    Ok(())
}

impl Validate for NewReview {
    fn validate(&self) -> Result<(), AppError> {
        if self.tour_id.is_empty() {
            return Err(AppError::Validation("Review must belong to a tour.".into()));
        }
        if self.user_id.is_empty() {
            return Err(AppError::Validation("Review must belong to a user.".into()));
        }
        validate_fields(&self.review, self.rating)
    }
}

impl Patch<Review> for ReviewPatch {
    fn apply(self, target: &mut Review) -> Result<(), AppError> {
        let review = match self.review {
            Some(review) => review.trim().to_string(),
            None => target.review.clone(),
        };
        let rating = self.rating.unwrap_or(target.rating);
        validate_fields(&review, rating)?;

        target.review = review;
        target.rating = rating;
        Ok(())
    }
}

impl Document for Review {
    const NAME: &'static str = "review";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("id", "r.id", FieldKind::Text),
        FieldSpec::new("rating", "r.rating", FieldKind::Integer).repeatable(),
        FieldSpec::new("tour_id", "r.tour_id", FieldKind::Text),
        FieldSpec::new("user_id", "r.user_id", FieldKind::Text),
        FieldSpec::new("created_at", "r.created_at", FieldKind::Timestamp),
    ];

    type Record = ReviewWithAuthor;
    type Create = NewReview;
    type Update = ReviewPatch;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_must_be_within_one_and_five() {
        let mut input = NewReview {
            review: "Loved it".into(),
            rating: 6,
            tour_id: "t1".into(),
            user_id: "u1".into(),
        };
        assert!(input.validate().is_err());

        input.rating = 5;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn rejected_patch_leaves_the_review_alone() {
        let mut review = Review::new(&NewReview {
            review: "Great".into(),
            rating: 4,
            tour_id: "t1".into(),
            user_id: "u1".into(),
        });
        let patch = ReviewPatch { review: Some("Changed my mind".into()), rating: Some(9) };
        assert!(patch.apply(&mut review).is_err());
        assert_eq!(review.review, "Great");
        assert_eq!(review.rating, 4);
    }

    #[test]
    fn serialized_review_embeds_the_author() {
        let review = ReviewWithAuthor {
            review: Review::new(&NewReview {
                review: "Great".into(),
                rating: 4,
                tour_id: "t1".into(),
                user_id: "u1".into(),
            }),
            author: ReviewAuthor { name: "Jonas".into(), photo: "default.jpg".into() },
        };

        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(json["rating"], 4);
        assert_eq!(json["user"]["name"], "Jonas");
    }
}
