//! Item model
//!
//! Items are the products listed in the shop. Prices are integer cents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product for sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Thumbnail image URL
    pub image: Option<String>,
    /// Full-size image URL
    pub large_image: Option<String>,
    /// Price in cents
    pub price: i64,
    /// ID of the user who listed the item
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an item
#[derive(Debug, Clone)]
pub struct CreateItemInput {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub price: i64,
}

impl CreateItemInput {
    pub fn new(title: impl Into<String>, description: impl Into<String>, price: i64) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            image: None,
            large_image: None,
            price,
        }
    }
}

/// Partial update of an item; `None` leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateItemInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub price: Option<i64>,
}

impl UpdateItemInput {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image.is_none()
            && self.large_image.is_none()
            && self.price.is_none()
    }

    /// Apply the patch to an item in place
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(image) = &self.image {
            item.image = Some(image.clone());
        }
        if let Some(large_image) = &self.large_image {
            item.large_image = Some(large_image.clone());
        }
        if let Some(price) = self.price {
            item.price = price;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Item {
        let now = Utc::now();
        Item {
            id: 1,
            title: "Hat".to_string(),
            description: "A warm hat".to_string(),
            image: None,
            large_image: None,
            price: 2500,
            user_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_patch_only_touches_given_fields() {
        let mut item = sample_item();
        let patch = UpdateItemInput {
            price: Some(3000),
            ..Default::default()
        };

        patch.apply_to(&mut item);

        assert_eq!(item.price, 3000);
        assert_eq!(item.title, "Hat");
        assert_eq!(item.description, "A warm hat");
    }

    #[test]
    fn test_empty_patch() {
        assert!(UpdateItemInput::default().is_empty());
        assert!(!UpdateItemInput {
            image: Some("a.jpg".to_string()),
            ..Default::default()
        }
        .is_empty());
    }
}
