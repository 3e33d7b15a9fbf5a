//! Cart service
//!
//! Adding an item the user already carts bumps the existing row's quantity
//! instead of inserting a second row.

use crate::db::is_unique_violation;
use crate::db::repositories::{CartItemRepository, ItemRepository};
use crate::models::{CartItem, CartLine, Item, User};
use crate::services::permissions::{require_user, PermissionError};
use anyhow::Context;
use std::sync::Arc;

/// Error types for cart service operations
#[derive(Debug, thiserror::Error)]
pub enum CartServiceError {
    #[error("Item not found")]
    ItemNotFound,

    #[error("No cart item found")]
    CartItemNotFound,

    #[error("You do not own this cart item")]
    NotOwner,

    #[error(transparent)]
    PermissionDenied(#[from] PermissionError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Cart service
pub struct CartService {
    cart_repo: Arc<dyn CartItemRepository>,
    item_repo: Arc<dyn ItemRepository>,
}

impl CartService {
    pub fn new(cart_repo: Arc<dyn CartItemRepository>, item_repo: Arc<dyn ItemRepository>) -> Self {
        Self {
            cart_repo,
            item_repo,
        }
    }

    /// Put one more of `item_id` in the actor's cart
    pub async fn add_to_cart(
        &self,
        actor: Option<&User>,
        item_id: i64,
    ) -> Result<CartItem, CartServiceError> {
        let actor = require_user(actor)?;

        self.item_repo
            .get_by_id(item_id)
            .await
            .context("Failed to get item")?
            .ok_or(CartServiceError::ItemNotFound)?;

        let existing = self
            .cart_repo
            .find(actor.id, item_id)
            .await
            .context("Failed to look up cart item")?;

        if let Some(existing) = existing {
            return self.increment(existing.id).await;
        }

        match self.cart_repo.create(actor.id, item_id).await {
            Ok(created) => {
                tracing::debug!(user_id = actor.id, item_id, "Item added to cart");
                Ok(created)
            }
            // Lost a race with a concurrent add for the same item
            Err(e) if is_unique_violation(&e) => {
                let existing = self
                    .cart_repo
                    .find(actor.id, item_id)
                    .await
                    .context("Failed to look up cart item")?
                    .ok_or(CartServiceError::CartItemNotFound)?;
                self.increment(existing.id).await
            }
            Err(e) => Err(e.context("Failed to add item to cart").into()),
        }
    }

    /// Remove a whole cart row, returning it
    pub async fn remove_from_cart(
        &self,
        actor: Option<&User>,
        cart_item_id: i64,
    ) -> Result<CartItem, CartServiceError> {
        let actor = require_user(actor)?;

        let cart_item = self
            .cart_repo
            .get_by_id(cart_item_id)
            .await
            .context("Failed to get cart item")?
            .ok_or(CartServiceError::CartItemNotFound)?;

        if cart_item.user_id != actor.id {
            return Err(CartServiceError::NotOwner);
        }

        let removed = self
            .cart_repo
            .delete(cart_item_id)
            .await
            .context("Failed to remove cart item")?;
        if !removed {
            return Err(CartServiceError::CartItemNotFound);
        }

        Ok(cart_item)
    }

    /// The user's cart lines, oldest first
    pub async fn cart_for(&self, user_id: i64) -> Result<Vec<CartLine>, CartServiceError> {
        Ok(self
            .cart_repo
            .list_for_user(user_id)
            .await
            .context("Failed to load cart")?)
    }

    /// Cart total in cents
    pub async fn cart_total(&self, user_id: i64) -> Result<i64, CartServiceError> {
        Ok(self
            .cart_repo
            .total_for_user(user_id)
            .await
            .context("Failed to total cart")?)
    }

    /// The item a cart row points at
    pub async fn item_for(&self, cart_item: &CartItem) -> Result<Option<Item>, CartServiceError> {
        Ok(self
            .item_repo
            .get_by_id(cart_item.item_id)
            .await
            .context("Failed to get cart item's item")?)
    }

    async fn increment(&self, id: i64) -> Result<CartItem, CartServiceError> {
        self.cart_repo
            .increment(id)
            .await
            .context("Failed to increment cart item")?
            .ok_or(CartServiceError::CartItemNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCartItemRepository, SqlxItemRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateItemInput, CreateUserInput, Permission};

    struct Harness {
        service: CartService,
        shopper: User,
        other: User,
        hat_id: i64,
        mug_id: i64,
    }

    async fn setup_test_service() -> Harness {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let mut made = Vec::new();
        for email in ["shopper@example.com", "other@example.com"] {
            made.push(
                users
                    .create(&CreateUserInput {
                        name: "Test".to_string(),
                        email: email.to_string(),
                        password_hash: "hash".to_string(),
                        permissions: vec![Permission::User],
                    })
                    .await
                    .unwrap(),
            );
        }
        let other = made.pop().unwrap();
        let shopper = made.pop().unwrap();

        let items = SqlxItemRepository::boxed(pool.clone());
        let hat = items
            .create(shopper.id, &CreateItemInput::new("Hat", "Warm", 2500))
            .await
            .unwrap();
        let mug = items
            .create(other.id, &CreateItemInput::new("Mug", "Blue", 800))
            .await
            .unwrap();

        Harness {
            service: CartService::new(SqlxCartItemRepository::boxed(pool), items),
            shopper,
            other,
            hat_id: hat.id,
            mug_id: mug.id,
        }
    }

    #[tokio::test]
    async fn test_add_to_cart_requires_login() {
        let h = setup_test_service().await;
        let err = h.service.add_to_cart(None, h.hat_id).await.unwrap_err();
        assert_eq!(err.to_string(), "You must be logged in to do that!");
    }

    #[tokio::test]
    async fn test_adding_same_item_increments_quantity() {
        let h = setup_test_service().await;

        let first = h.service.add_to_cart(Some(&h.shopper), h.hat_id).await.unwrap();
        assert_eq!(first.quantity, 1);

        let second = h.service.add_to_cart(Some(&h.shopper), h.hat_id).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.quantity, 2);

        let lines = h.service.cart_for(h.shopper.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].cart_item.quantity, 2);
    }

    #[tokio::test]
    async fn test_carts_are_per_user() {
        let h = setup_test_service().await;

        let mine = h.service.add_to_cart(Some(&h.shopper), h.mug_id).await.unwrap();
        let theirs = h.service.add_to_cart(Some(&h.other), h.mug_id).await.unwrap();

        assert_ne!(mine.id, theirs.id);
        assert_eq!(theirs.quantity, 1);
    }

    #[tokio::test]
    async fn test_add_missing_item() {
        let h = setup_test_service().await;
        let err = h.service.add_to_cart(Some(&h.shopper), 9999).await.unwrap_err();
        assert!(matches!(err, CartServiceError::ItemNotFound));
    }

    #[tokio::test]
    async fn test_cart_total() {
        let h = setup_test_service().await;
        h.service.add_to_cart(Some(&h.shopper), h.hat_id).await.unwrap();
        h.service.add_to_cart(Some(&h.shopper), h.hat_id).await.unwrap();
        h.service.add_to_cart(Some(&h.shopper), h.mug_id).await.unwrap();

        assert_eq!(h.service.cart_total(h.shopper.id).await.unwrap(), 2 * 2500 + 800);
        assert_eq!(h.service.cart_total(h.other.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_from_cart() {
        let h = setup_test_service().await;
        let row = h.service.add_to_cart(Some(&h.shopper), h.hat_id).await.unwrap();

        let err = h.service.remove_from_cart(Some(&h.other), row.id).await.unwrap_err();
        assert_eq!(err.to_string(), "You do not own this cart item");

        let removed = h.service.remove_from_cart(Some(&h.shopper), row.id).await.unwrap();
        assert_eq!(removed.id, row.id);
        assert!(h.service.cart_for(h.shopper.id).await.unwrap().is_empty());

        let err = h.service.remove_from_cart(Some(&h.shopper), row.id).await.unwrap_err();
        assert_eq!(err.to_string(), "No cart item found");
    }

    #[tokio::test]
    async fn test_item_for_cart_row() {
        let h = setup_test_service().await;
        let row = h.service.add_to_cart(Some(&h.shopper), h.mug_id).await.unwrap();

        let item = h.service.item_for(&row).await.unwrap().unwrap();
        assert_eq!(item.title, "Mug");
    }
}
