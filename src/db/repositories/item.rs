//! Item repository
//!
//! Database operations for shop items.
//!
//! This module provides:
//! - `ItemRepository` trait defining the interface for item data access
//! - `SqlxItemRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreateItemInput, Item};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Item repository trait
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Create an item owned by `user_id`
    async fn create(&self, user_id: i64, input: &CreateItemInput) -> Result<Item>;

    /// Get item by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Item>>;

    /// Persist every mutable column of `item`
    async fn update(&self, item: &Item) -> Result<Item>;

    /// Delete an item, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// List items newest first
    async fn list(&self, skip: i64, first: i64) -> Result<Vec<Item>>;

    /// Count all items
    async fn count(&self) -> Result<i64>;

    /// Case-insensitive substring search over title and description
    async fn search(&self, term: &str, limit: i64) -> Result<Vec<Item>>;
}

/// SQLx-based item repository implementation
pub struct SqlxItemRepository {
    pool: DynDatabasePool,
}

impl SqlxItemRepository {
    /// Create a new SQLx item repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ItemRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ItemRepository for SqlxItemRepository {
    async fn create(&self, user_id: i64, input: &CreateItemInput) -> Result<Item> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_item_sqlite(self.pool.sqlite()?, user_id, input).await,
            DatabaseDriver::Mysql => create_item_mysql(self.pool.mysql()?, user_id, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Item>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_item_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_item_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn update(&self, item: &Item) -> Result<Item> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_item_sqlite(self.pool.sqlite()?, item).await,
            DatabaseDriver::Mysql => update_item_mysql(self.pool.mysql()?, item).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM items WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete item")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM items WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete item")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, skip: i64, first: i64) -> Result<Vec<Item>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_items_sqlite(self.pool.sqlite()?, skip, first).await,
            DatabaseDriver::Mysql => list_items_mysql(self.pool.mysql()?, skip, first).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar("SELECT COUNT(*) FROM items")
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count items")?,
            DatabaseDriver::Mysql => sqlx::query_scalar("SELECT COUNT(*) FROM items")
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count items")?,
        };
        Ok(count)
    }

    async fn search(&self, term: &str, limit: i64) -> Result<Vec<Item>> {
        let pattern = like_pattern(term);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => search_items_sqlite(self.pool.sqlite()?, &pattern, limit).await,
            DatabaseDriver::Mysql => search_items_mysql(self.pool.mysql()?, &pattern, limit).await,
        }
    }
}

const ITEM_COLUMNS: &str =
    "id, title, description, image, large_image, price, user_id, created_at, updated_at";

const SEARCH_SQL: &str = r#"
    SELECT id, title, description, image, large_image, price, user_id, created_at, updated_at
    FROM items
    WHERE search_text LIKE ? ESCAPE '!'
    ORDER BY created_at DESC, id DESC
    LIMIT ?
"#;

/// Lowercased title and description, stored alongside the item
///
/// SQL `LOWER()` only folds ASCII in SQLite, so folding happens here with
/// Unicode rules and search matches against this column.
fn search_text(title: &str, description: &str) -> String {
    format!("{}\n{}", title.to_lowercase(), description.to_lowercase())
}

/// Lowercased `%term%` with LIKE wildcards escaped by `!`
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_item_sqlite(pool: &SqlitePool, user_id: i64, input: &CreateItemInput) -> Result<Item> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO items (title, description, image, large_image, price, search_text, user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.image)
    .bind(&input.large_image)
    .bind(input.price)
    .bind(search_text(&input.title, &input.description))
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create item")?;

    Ok(Item {
        id: result.last_insert_rowid(),
        title: input.title.clone(),
        description: input.description.clone(),
        image: input.image.clone(),
        large_image: input.large_image.clone(),
        price: input.price,
        user_id,
        created_at: now,
        updated_at: now,
    })
}

async fn get_item_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Item>> {
    let row = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get item by ID")?;

    Ok(row.as_ref().map(row_to_item_sqlite))
}

async fn update_item_sqlite(pool: &SqlitePool, item: &Item) -> Result<Item> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE items
        SET title = ?, description = ?, image = ?, large_image = ?, price = ?, search_text = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.image)
    .bind(&item.large_image)
    .bind(item.price)
    .bind(search_text(&item.title, &item.description))
    .bind(now)
    .bind(item.id)
    .execute(pool)
    .await
    .context("Failed to update item")?;

    Ok(Item {
        updated_at: now,
        ..item.clone()
    })
}

async fn list_items_sqlite(pool: &SqlitePool, skip: i64, first: i64) -> Result<Vec<Item>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM items ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        ITEM_COLUMNS
    ))
    .bind(first)
    .bind(skip)
    .fetch_all(pool)
    .await
    .context("Failed to list items")?;

    Ok(rows.iter().map(row_to_item_sqlite).collect())
}

async fn search_items_sqlite(pool: &SqlitePool, pattern: &str, limit: i64) -> Result<Vec<Item>> {
    let rows = sqlx::query(SEARCH_SQL)
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to search items")?;

    Ok(rows.iter().map(row_to_item_sqlite).collect())
}

pub(crate) fn row_to_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> Item {
    Item {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        image: row.get("image"),
        large_image: row.get("large_image"),
        price: row.get("price"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_item_mysql(pool: &MySqlPool, user_id: i64, input: &CreateItemInput) -> Result<Item> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO items (title, description, image, large_image, price, search_text, user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.image)
    .bind(&input.large_image)
    .bind(input.price)
    .bind(search_text(&input.title, &input.description))
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create item")?;

    Ok(Item {
        id: result.last_insert_id() as i64,
        title: input.title.clone(),
        description: input.description.clone(),
        image: input.image.clone(),
        large_image: input.large_image.clone(),
        price: input.price,
        user_id,
        created_at: now,
        updated_at: now,
    })
}

async fn get_item_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Item>> {
    let row = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get item by ID")?;

    Ok(row.as_ref().map(row_to_item_mysql))
}

async fn update_item_mysql(pool: &MySqlPool, item: &Item) -> Result<Item> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE items
        SET title = ?, description = ?, image = ?, large_image = ?, price = ?, search_text = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.image)
    .bind(&item.large_image)
    .bind(item.price)
    .bind(search_text(&item.title, &item.description))
    .bind(now)
    .bind(item.id)
    .execute(pool)
    .await
    .context("Failed to update item")?;

    Ok(Item {
        updated_at: now,
        ..item.clone()
    })
}

async fn list_items_mysql(pool: &MySqlPool, skip: i64, first: i64) -> Result<Vec<Item>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM items ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        ITEM_COLUMNS
    ))
    .bind(first)
    .bind(skip)
    .fetch_all(pool)
    .await
    .context("Failed to list items")?;

    Ok(rows.iter().map(row_to_item_mysql).collect())
}

async fn search_items_mysql(pool: &MySqlPool, pattern: &str, limit: i64) -> Result<Vec<Item>> {
    let rows = sqlx::query(SEARCH_SQL)
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to search items")?;

    Ok(rows.iter().map(row_to_item_mysql).collect())
}

pub(crate) fn row_to_item_mysql(row: &sqlx::mysql::MySqlRow) -> Item {
    Item {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        image: row.get("image"),
        large_image: row.get("large_image"),
        price: row.get("price"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
