//! Cart item repository
//!
//! Database operations for cart rows. A user holds at most one row per item;
//! repeated adds bump `quantity` on that row.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CartItem, CartLine, Item};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Cart item repository trait
#[async_trait]
pub trait CartItemRepository: Send + Sync {
    /// Find the user's row for an item
    async fn find(&self, user_id: i64, item_id: i64) -> Result<Option<CartItem>>;

    /// Insert a row with quantity 1.
    ///
    /// Fails with a unique violation when the user already carts the item.
    async fn create(&self, user_id: i64, item_id: i64) -> Result<CartItem>;

    /// Add one to the row's quantity and return the updated row
    async fn increment(&self, id: i64) -> Result<Option<CartItem>>;

    /// Get cart row by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<CartItem>>;

    /// Delete a cart row, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// The user's cart rows joined with their items, oldest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<CartLine>>;

    /// Sum of quantity x price over the user's cart, in cents
    async fn total_for_user(&self, user_id: i64) -> Result<i64>;
}

/// SQLx-based cart item repository implementation
pub struct SqlxCartItemRepository {
    pool: DynDatabasePool,
}

impl SqlxCartItemRepository {
    /// Create a new SQLx cart item repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CartItemRepository> {
        Arc::new(Self::new(pool))
    }
}

const CART_COLUMNS: &str = "id, quantity, item_id, user_id, created_at";

const CART_LINES_SQL: &str = r#"
    SELECT c.id AS cart_id, c.quantity, c.created_at AS cart_created_at,
           i.id, i.title, i.description, i.image, i.large_image, i.price, i.user_id,
           i.created_at, i.updated_at, c.user_id AS cart_user_id
    FROM cart_items c
    INNER JOIN items i ON i.id = c.item_id
    WHERE c.user_id = ?
    ORDER BY c.created_at ASC, c.id ASC
"#;

#[async_trait]
impl CartItemRepository for SqlxCartItemRepository {
    async fn find(&self, user_id: i64, item_id: i64) -> Result<Option<CartItem>> {
        let sql = format!(
            "SELECT {} FROM cart_items WHERE user_id = ? AND item_id = ?",
            CART_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(item_id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to find cart item")?;
                Ok(row.as_ref().map(row_to_cart_item_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(item_id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to find cart item")?;
                Ok(row.as_ref().map(row_to_cart_item_mysql))
            }
        }
    }

    async fn create(&self, user_id: i64, item_id: i64) -> Result<CartItem> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_cart_item_sqlite(self.pool.sqlite()?, user_id, item_id).await,
            DatabaseDriver::Mysql => create_cart_item_mysql(self.pool.mysql()?, user_id, item_id).await,
        }
    }

    async fn increment(&self, id: i64) -> Result<Option<CartItem>> {
        let sql = "UPDATE cart_items SET quantity = quantity + 1 WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to increment cart item")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to increment cart item")?;
            }
        }
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<CartItem>> {
        let sql = format!("SELECT {} FROM cart_items WHERE id = ?", CART_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get cart item by ID")?;
                Ok(row.as_ref().map(row_to_cart_item_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get cart item by ID")?;
                Ok(row.as_ref().map(row_to_cart_item_mysql))
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM cart_items WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete cart item")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete cart item")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<CartLine>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(CART_LINES_SQL)
                    .bind(user_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list cart")?;
                Ok(rows.iter().map(row_to_cart_line_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(CART_LINES_SQL)
                    .bind(user_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list cart")?;
                Ok(rows.iter().map(row_to_cart_line_mysql).collect())
            }
        }
    }

    async fn total_for_user(&self, user_id: i64) -> Result<i64> {
        let total: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(c.quantity * i.price), 0)
                FROM cart_items c INNER JOIN items i ON i.id = c.item_id
                WHERE c.user_id = ?
                "#,
            )
            .bind(user_id)
            .fetch_one(self.pool.sqlite()?)
            .await
            .context("Failed to total cart")?,
            // SUM yields DECIMAL on MySQL
            DatabaseDriver::Mysql => sqlx::query_scalar(
                r#"
                SELECT CAST(COALESCE(SUM(c.quantity * i.price), 0) AS SIGNED)
                FROM cart_items c INNER JOIN items i ON i.id = c.item_id
                WHERE c.user_id = ?
                "#,
            )
            .bind(user_id)
            .fetch_one(self.pool.mysql()?)
            .await
            .context("Failed to total cart")?,
        };
        Ok(total)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_cart_item_sqlite(pool: &SqlitePool, user_id: i64, item_id: i64) -> Result<CartItem> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO cart_items (quantity, item_id, user_id, created_at) VALUES (1, ?, ?, ?)",
    )
    .bind(item_id)
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create cart item")?;

    Ok(CartItem {
        id: result.last_insert_rowid(),
        quantity: 1,
        item_id,
        user_id,
        created_at: now,
    })
}

fn row_to_cart_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> CartItem {
    CartItem {
        id: row.get("id"),
        quantity: row.get("quantity"),
        item_id: row.get("item_id"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

fn row_to_cart_line_sqlite(row: &sqlx::sqlite::SqliteRow) -> CartLine {
    let item: Item = super::item::row_to_item_sqlite(row);
    CartLine {
        cart_item: CartItem {
            id: row.get("cart_id"),
            quantity: row.get("quantity"),
            item_id: item.id,
            user_id: row.get("cart_user_id"),
            created_at: row.get("cart_created_at"),
        },
        item,
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_cart_item_mysql(pool: &MySqlPool, user_id: i64, item_id: i64) -> Result<CartItem> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO cart_items (quantity, item_id, user_id, created_at) VALUES (1, ?, ?, ?)",
    )
    .bind(item_id)
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create cart item")?;

    Ok(CartItem {
        id: result.last_insert_id() as i64,
        quantity: 1,
        item_id,
        user_id,
        created_at: now,
    })
}

fn row_to_cart_item_mysql(row: &sqlx::mysql::MySqlRow) -> CartItem {
    CartItem {
        id: row.get("id"),
        quantity: row.get("quantity"),
        item_id: row.get("item_id"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

fn row_to_cart_line_mysql(row: &sqlx::mysql::MySqlRow) -> CartLine {
    let item: Item = super::item::row_to_item_mysql(row);
    CartLine {
        cart_item: CartItem {
            id: row.get("cart_id"),
            quantity: row.get("quantity"),
            item_id: item.id,
            user_id: row.get("cart_user_id"),
            created_at: row.get("cart_created_at"),
        },
        item,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};

    struct Fixture {
        repo: SqlxCartItemRepository,
        user_id: i64,
        hat_id: i64,
        mug_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite = pool.sqlite().unwrap();

        let user_id = sqlx::query(
            "INSERT INTO users (name, email, password_hash) VALUES ('Shopper', 'shop@example.com', 'hash')",
        )
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();

        let mut ids = Vec::new();
        for (title, price) in [("Hat", 2500_i64), ("Mug", 800)] {
            let id = sqlx::query(
                "INSERT INTO items (title, description, price, user_id) VALUES (?, 'x', ?, ?)",
            )
            .bind(title)
            .bind(price)
            .bind(user_id)
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid();
            ids.push(id);
        }

        Fixture {
            repo: SqlxCartItemRepository::new(pool.clone()),
            user_id,
            hat_id: ids[0],
            mug_id: ids[1],
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let f = setup().await;

        let created = f.repo.create(f.user_id, f.hat_id).await.unwrap();
        assert_eq!(created.quantity, 1);

        let found = f.repo.find(f.user_id, f.hat_id).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(f.repo.find(f.user_id, f.mug_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_row_is_unique_violation() {
        let f = setup().await;
        f.repo.create(f.user_id, f.hat_id).await.unwrap();

        let err = f.repo.create(f.user_id, f.hat_id).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_increment() {
        let f = setup().await;
        let row = f.repo.create(f.user_id, f.hat_id).await.unwrap();

        f.repo.increment(row.id).await.unwrap();
        let bumped = f.repo.increment(row.id).await.unwrap().unwrap();

        assert_eq!(bumped.quantity, 3);
        assert!(f.repo.increment(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_and_total() {
        let f = setup().await;
        let hat = f.repo.create(f.user_id, f.hat_id).await.unwrap();
        f.repo.increment(hat.id).await.unwrap();
        f.repo.create(f.user_id, f.mug_id).await.unwrap();

        let lines = f.repo.list_for_user(f.user_id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].item.title, "Hat");
        assert_eq!(lines[0].cart_item.quantity, 2);
        assert_eq!(lines[0].subtotal(), 5000);
        assert_eq!(lines[1].item.title, "Mug");

        assert_eq!(f.repo.total_for_user(f.user_id).await.unwrap(), 5800);
    }

    #[tokio::test]
    async fn test_total_of_empty_cart_is_zero() {
        let f = setup().await;
        assert_eq!(f.repo.total_for_user(f.user_id).await.unwrap(), 0);
        assert!(f.repo.list_for_user(f.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let f = setup().await;
        let row = f.repo.create(f.user_id, f.mug_id).await.unwrap();

        assert!(f.repo.delete(row.id).await.unwrap());
        assert!(!f.repo.delete(row.id).await.unwrap());
        assert!(f.repo.get_by_id(row.id).await.unwrap().is_none());
    }
}
