//! Item service
//!
//! Business rules for the catalogue: any signed-in user may list an item,
//! owners may edit or remove their own, and `ITEMUPDATE` / `ITEMDELETE` (or
//! `ADMIN`) extend that to everyone's items.

use crate::db::repositories::ItemRepository;
use crate::models::{CreateItemInput, Item, Permission, UpdateItemInput, User};
use crate::services::permissions::{has_permission, require_user, PermissionError};
use anyhow::Context;
use std::sync::Arc;

/// Page size used when the caller does not ask for one
pub const DEFAULT_PER_PAGE: i64 = 4;

/// Largest page a caller may request
pub const MAX_PER_PAGE: i64 = 100;

/// Most results a search returns
pub const MAX_SEARCH_RESULTS: i64 = 20;

/// Error types for item service operations
#[derive(Debug, thiserror::Error)]
pub enum ItemServiceError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Item not found")]
    NotFound,

    #[error(transparent)]
    PermissionDenied(#[from] PermissionError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Item service for the catalogue
pub struct ItemService {
    item_repo: Arc<dyn ItemRepository>,
    per_page: i64,
}

impl ItemService {
    pub fn new(item_repo: Arc<dyn ItemRepository>) -> Self {
        Self {
            item_repo,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Override the default page size
    pub fn with_per_page(mut self, per_page: i64) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    /// List a new item owned by the actor
    pub async fn create_item(
        &self,
        actor: Option<&User>,
        mut input: CreateItemInput,
    ) -> Result<Item, ItemServiceError> {
        let actor = require_user(actor)?;

        input.title = input.title.trim().to_string();
        validate_title(&input.title)?;
        validate_price(input.price)?;

        let item = self
            .item_repo
            .create(actor.id, &input)
            .await
            .context("Failed to create item")?;

        tracing::info!(item_id = item.id, user_id = actor.id, "Item created");
        Ok(item)
    }

    /// Apply a partial update; only the given fields change
    pub async fn update_item(
        &self,
        actor: Option<&User>,
        id: i64,
        patch: UpdateItemInput,
    ) -> Result<Item, ItemServiceError> {
        let actor = require_user(actor)?;
        let mut item = self.find(id).await?;
        ensure_can_modify(actor, &item, &[Permission::Admin, Permission::ItemUpdate])?;

        if let Some(title) = &patch.title {
            validate_title(title.trim())?;
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }

        if patch.is_empty() {
            return Ok(item);
        }

        patch.apply_to(&mut item);
        item.title = item.title.trim().to_string();

        let updated = self
            .item_repo
            .update(&item)
            .await
            .context("Failed to update item")?;

        tracing::info!(item_id = id, user_id = actor.id, "Item updated");
        Ok(updated)
    }

    /// Delete an item, returning it as it was
    pub async fn delete_item(&self, actor: Option<&User>, id: i64) -> Result<Item, ItemServiceError> {
        let actor = require_user(actor)?;
        let item = self.find(id).await?;
        ensure_can_modify(actor, &item, &[Permission::Admin, Permission::ItemDelete])?;

        let deleted = self
            .item_repo
            .delete(id)
            .await
            .context("Failed to delete item")?;
        if !deleted {
            return Err(ItemServiceError::NotFound);
        }

        tracing::info!(item_id = id, user_id = actor.id, "Item deleted");
        Ok(item)
    }

    /// Newest first. `first` defaults to the configured page size and is
    /// capped at [`MAX_PER_PAGE`].
    pub async fn list_items(
        &self,
        skip: Option<i64>,
        first: Option<i64>,
    ) -> Result<Vec<Item>, ItemServiceError> {
        let skip = skip.unwrap_or(0);
        let first = first.unwrap_or(self.per_page);

        if skip < 0 {
            return Err(ItemServiceError::ValidationError("skip must not be negative".into()));
        }
        if first < 0 {
            return Err(ItemServiceError::ValidationError("first must not be negative".into()));
        }

        let items = self
            .item_repo
            .list(skip, first.min(MAX_PER_PAGE))
            .await
            .context("Failed to list items")?;
        Ok(items)
    }

    pub async fn get_item(&self, id: i64) -> Result<Option<Item>, ItemServiceError> {
        Ok(self
            .item_repo
            .get_by_id(id)
            .await
            .context("Failed to get item")?)
    }

    pub async fn count_items(&self) -> Result<i64, ItemServiceError> {
        Ok(self.item_repo.count().await.context("Failed to count items")?)
    }

    /// Case-insensitive match on title or description. A blank term matches nothing.
    pub async fn search_items(&self, term: &str) -> Result<Vec<Item>, ItemServiceError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .item_repo
            .search(term, MAX_SEARCH_RESULTS)
            .await
            .context("Failed to search items")?)
    }

    async fn find(&self, id: i64) -> Result<Item, ItemServiceError> {
        self.item_repo
            .get_by_id(id)
            .await
            .context("Failed to get item")?
            .ok_or(ItemServiceError::NotFound)
    }
}

/// Owners may always touch their own items; everyone else needs one of `required`
fn ensure_can_modify(
    actor: &User,
    item: &Item,
    required: &[Permission],
) -> Result<(), ItemServiceError> {
    if actor.id != item.user_id {
        has_permission(actor, required)?;
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), ItemServiceError> {
    if title.is_empty() {
        return Err(ItemServiceError::ValidationError("Title is required".into()));
    }
    Ok(())
}

fn validate_price(price: i64) -> Result<(), ItemServiceError> {
    if price < 0 {
        return Err(ItemServiceError::ValidationError("Price must not be negative".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxItemRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::CreateUserInput;

    struct Harness {
        service: ItemService,
        users: SqlxUserRepository,
    }

    async fn setup_test_service() -> Harness {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        Harness {
            service: ItemService::new(SqlxItemRepository::boxed(pool.clone())),
            users: SqlxUserRepository::new(pool),
        }
    }

    async fn make_user(h: &Harness, email: &str, permissions: Vec<Permission>) -> User {
        h.users
            .create(&CreateUserInput {
                name: "Test".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                permissions,
            })
            .await
            .expect("Failed to create user")
    }

    #[tokio::test]
    async fn test_create_item_requires_login() {
        let h = setup_test_service().await;

        let err = h
            .service
            .create_item(None, CreateItemInput::new("Hat", "Warm", 100))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "You must be logged in to do that!");
    }

    #[tokio::test]
    async fn test_create_item_validation() {
        let h = setup_test_service().await;
        let user = make_user(&h, "seller@example.com", vec![Permission::User]).await;

        let err = h
            .service
            .create_item(Some(&user), CreateItemInput::new("   ", "Warm", 100))
            .await
            .unwrap_err();
        assert!(matches!(err, ItemServiceError::ValidationError(_)));

        let err = h
            .service
            .create_item(Some(&user), CreateItemInput::new("Hat", "Warm", -1))
            .await
            .unwrap_err();
        assert!(matches!(err, ItemServiceError::ValidationError(_)));

        let item = h
            .service
            .create_item(Some(&user), CreateItemInput::new(" Hat ", "Warm", 0))
            .await
            .unwrap();
        assert_eq!(item.title, "Hat");
        assert_eq!(item.user_id, user.id);
    }

    #[tokio::test]
    async fn test_update_item_by_owner_and_privileged_user() {
        let h = setup_test_service().await;
        let owner = make_user(&h, "owner@example.com", vec![Permission::User]).await;
        let stranger = make_user(&h, "stranger@example.com", vec![Permission::User]).await;
        let editor = make_user(&h, "editor@example.com", vec![Permission::ItemUpdate]).await;

        let item = h
            .service
            .create_item(Some(&owner), CreateItemInput::new("Hat", "Warm", 100))
            .await
            .unwrap();

        let patch = UpdateItemInput {
            price: Some(150),
            ..Default::default()
        };
        let updated = h.service.update_item(Some(&owner), item.id, patch).await.unwrap();
        assert_eq!(updated.price, 150);
        assert_eq!(updated.title, "Hat");

        let err = h
            .service
            .update_item(
                Some(&stranger),
                item.id,
                UpdateItemInput {
                    title: Some("Mine now".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ItemServiceError::PermissionDenied(_)));

        let updated = h
            .service
            .update_item(
                Some(&editor),
                item.id,
                UpdateItemInput {
                    description: Some("Very warm".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description, "Very warm");
        assert_eq!(updated.price, 150);
    }

    #[tokio::test]
    async fn test_update_missing_item() {
        let h = setup_test_service().await;
        let admin = make_user(&h, "admin@example.com", vec![Permission::Admin]).await;

        let err = h
            .service
            .update_item(Some(&admin), 404, UpdateItemInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ItemServiceError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_item_permissions() {
        let h = setup_test_service().await;
        let owner = make_user(&h, "owner@example.com", vec![Permission::User]).await;
        let updater = make_user(&h, "updater@example.com", vec![Permission::ItemUpdate]).await;
        let deleter = make_user(&h, "deleter@example.com", vec![Permission::ItemDelete]).await;

        let item = h
            .service
            .create_item(Some(&owner), CreateItemInput::new("Mug", "Blue", 800))
            .await
            .unwrap();

        let err = h.service.delete_item(Some(&updater), item.id).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("You do not have sufficient permissions: ADMIN, ITEMDELETE"));

        let deleted = h.service.delete_item(Some(&deleter), item.id).await.unwrap();
        assert_eq!(deleted.id, item.id);

        let err = h.service.delete_item(Some(&owner), item.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Item not found");
    }

    #[tokio::test]
    async fn test_list_items_paging_rules() {
        let h = setup_test_service().await;
        let owner = make_user(&h, "owner@example.com", vec![Permission::User]).await;
        for i in 0..6 {
            h.service
                .create_item(Some(&owner), CreateItemInput::new(format!("Item {}", i), "x", 10))
                .await
                .unwrap();
        }

        let page = h.service.list_items(None, None).await.unwrap();
        assert_eq!(page.len(), DEFAULT_PER_PAGE as usize);
        assert_eq!(page[0].title, "Item 5");

        let page = h.service.list_items(Some(4), None).await.unwrap();
        assert_eq!(page.len(), 2);

        let page = h.service.list_items(None, Some(1000)).await.unwrap();
        assert_eq!(page.len(), 6);

        assert!(h.service.list_items(Some(-1), None).await.is_err());
        assert!(h.service.list_items(None, Some(-1)).await.is_err());

        assert_eq!(h.service.count_items().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_search_and_get() {
        let h = setup_test_service().await;
        let owner = make_user(&h, "owner@example.com", vec![Permission::User]).await;
        let hat = h
            .service
            .create_item(Some(&owner), CreateItemInput::new("Wool Hat", "Warm", 100))
            .await
            .unwrap();

        assert_eq!(h.service.search_items("wool").await.unwrap().len(), 1);
        assert!(h.service.search_items("   ").await.unwrap().is_empty());

        assert_eq!(h.service.get_item(hat.id).await.unwrap().unwrap().title, "Wool Hat");
        assert!(h.service.get_item(hat.id + 1).await.unwrap().is_none());
    }
}
