//! User repository
//!
//! Database operations for users, their permission sets and password reset
//! tokens.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreateUserInput, Permission, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user together with its permission set.
    ///
    /// A duplicate email fails with the database's unique violation.
    async fn create(&self, input: &CreateUserInput) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by (already normalized) email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// List every user, oldest first
    async fn list(&self) -> Result<Vec<User>>;

    /// Replace the user's permission set
    async fn set_permissions(&self, user_id: i64, permissions: &[Permission]) -> Result<()>;

    /// Store a password reset token and its expiry
    async fn set_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<()>;

    /// Find the user holding `token`, provided it has not expired at `now`
    async fn find_by_reset_token(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>>;

    /// Store a new password hash and clear any reset token
    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_email_sqlite(self.pool.sqlite()?, email).await,
            DatabaseDriver::Mysql => get_user_by_email_mysql(self.pool.mysql()?, email).await,
        }
    }

    async fn list(&self) -> Result<Vec<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_users_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_users_mysql(self.pool.mysql()?).await,
        }
    }

    async fn set_permissions(&self, user_id: i64, permissions: &[Permission]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_permissions_sqlite(self.pool.sqlite()?, user_id, permissions).await
            }
            DatabaseDriver::Mysql => {
                set_permissions_mysql(self.pool.mysql()?, user_id, permissions).await
            }
        }
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_reset_token_sqlite(self.pool.sqlite()?, user_id, token, expiry).await
            }
            DatabaseDriver::Mysql => {
                set_reset_token_mysql(self.pool.mysql()?, user_id, token, expiry).await
            }
        }
    }

    async fn find_by_reset_token(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_by_reset_token_sqlite(self.pool.sqlite()?, token, now).await
            }
            DatabaseDriver::Mysql => {
                find_by_reset_token_mysql(self.pool.mysql()?, token, now).await
            }
        }
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_password_sqlite(self.pool.sqlite()?, user_id, password_hash).await
            }
            DatabaseDriver::Mysql => {
                update_password_mysql(self.pool.mysql()?, user_id, password_hash).await
            }
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

/// Sort into declaration order and drop duplicates
fn normalize_permissions(permissions: &[Permission]) -> Vec<Permission> {
    Permission::ALL
        .into_iter()
        .filter(|p| permissions.contains(p))
        .collect()
}

fn parse_permissions(raw: Vec<String>) -> Result<Vec<Permission>> {
    let permissions = raw
        .iter()
        .map(|s| {
            Permission::from_str(s).with_context(|| format!("Invalid permission in database: {}", s))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(normalize_permissions(&permissions))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.password_hash)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create user")?;

    let id = result.last_insert_rowid();

    let permissions = normalize_permissions(&input.permissions);
    for permission in &permissions {
        sqlx::query("INSERT INTO user_permissions (user_id, permission) VALUES (?, ?)")
            .bind(id)
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to grant permission")?;
    }

    tx.commit().await.context("Failed to commit user")?;

    Ok(User {
        id,
        name: input.name.clone(),
        email: input.email.clone(),
        password_hash: input.password_hash.clone(),
        permissions,
        created_at: now,
        updated_at: now,
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    match row {
        Some(row) => Ok(Some(load_user_sqlite(pool, &row).await?)),
        None => Ok(None),
    }
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    match row {
        Some(row) => Ok(Some(load_user_sqlite(pool, &row).await?)),
        None => Ok(None),
    }
}

async fn list_users_sqlite(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    let grants = sqlx::query("SELECT user_id, permission FROM user_permissions")
        .fetch_all(pool)
        .await
        .context("Failed to list permissions")?;

    let mut by_user: HashMap<i64, Vec<String>> = HashMap::new();
    for grant in grants {
        by_user
            .entry(grant.get("user_id"))
            .or_default()
            .push(grant.get("permission"));
    }

    rows.iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let permissions = parse_permissions(by_user.remove(&id).unwrap_or_default())?;
            Ok(row_to_user_sqlite(row, permissions))
        })
        .collect()
}

async fn set_permissions_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    permissions: &[Permission],
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM user_permissions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear permissions")?;

    for permission in normalize_permissions(permissions) {
        sqlx::query("INSERT INTO user_permissions (user_id, permission) VALUES (?, ?)")
            .bind(user_id)
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to grant permission")?;
    }

    sqlx::query("UPDATE users SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to touch user")?;

    tx.commit().await.context("Failed to commit permissions")?;
    Ok(())
}

async fn set_reset_token_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    token: &str,
    expiry: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE users SET reset_token = ?, reset_token_expiry = ?, updated_at = ? WHERE id = ?",
    )
    .bind(token)
    .bind(expiry)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to store reset token")?;
    Ok(())
}

async fn find_by_reset_token_sqlite(
    pool: &SqlitePool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {}, reset_token_expiry FROM users WHERE reset_token = ?",
        USER_COLUMNS
    ))
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to look up reset token")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let expiry: Option<DateTime<Utc>> = row.get("reset_token_expiry");
    if !expiry.is_some_and(|expiry| expiry > now) {
        return Ok(None);
    }

    Ok(Some(load_user_sqlite(pool, &row).await?))
}

async fn update_password_sqlite(pool: &SqlitePool, user_id: i64, password_hash: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_hash = ?, reset_token = NULL, reset_token_expiry = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(password_hash)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to update password")?;
    Ok(())
}

async fn load_user_sqlite(pool: &SqlitePool, row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let id: i64 = row.get("id");
    let raw: Vec<String> =
        sqlx::query_scalar("SELECT permission FROM user_permissions WHERE user_id = ?")
            .bind(id)
            .fetch_all(pool)
            .await
            .context("Failed to load permissions")?;
    Ok(row_to_user_sqlite(row, parse_permissions(raw)?))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow, permissions: Vec<Permission>) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        permissions,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.password_hash)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create user")?;

    let id = result.last_insert_id() as i64;

    let permissions = normalize_permissions(&input.permissions);
    for permission in &permissions {
        sqlx::query("INSERT INTO user_permissions (user_id, permission) VALUES (?, ?)")
            .bind(id)
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to grant permission")?;
    }

    tx.commit().await.context("Failed to commit user")?;

    Ok(User {
        id,
        name: input.name.clone(),
        email: input.email.clone(),
        password_hash: input.password_hash.clone(),
        permissions,
        created_at: now,
        updated_at: now,
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    match row {
        Some(row) => Ok(Some(load_user_mysql(pool, &row).await?)),
        None => Ok(None),
    }
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    match row {
        Some(row) => Ok(Some(load_user_mysql(pool, &row).await?)),
        None => Ok(None),
    }
}

async fn list_users_mysql(pool: &MySqlPool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    let grants = sqlx::query("SELECT user_id, permission FROM user_permissions")
        .fetch_all(pool)
        .await
        .context("Failed to list permissions")?;

    let mut by_user: HashMap<i64, Vec<String>> = HashMap::new();
    for grant in grants {
        by_user
            .entry(grant.get("user_id"))
            .or_default()
            .push(grant.get("permission"));
    }

    rows.iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let permissions = parse_permissions(by_user.remove(&id).unwrap_or_default())?;
            Ok(row_to_user_mysql(row, permissions))
        })
        .collect()
}

async fn set_permissions_mysql(
    pool: &MySqlPool,
    user_id: i64,
    permissions: &[Permission],
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM user_permissions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear permissions")?;

    for permission in normalize_permissions(permissions) {
        sqlx::query("INSERT INTO user_permissions (user_id, permission) VALUES (?, ?)")
            .bind(user_id)
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to grant permission")?;
    }

    sqlx::query("UPDATE users SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to touch user")?;

    tx.commit().await.context("Failed to commit permissions")?;
    Ok(())
}

async fn set_reset_token_mysql(
    pool: &MySqlPool,
    user_id: i64,
    token: &str,
    expiry: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE users SET reset_token = ?, reset_token_expiry = ?, updated_at = ? WHERE id = ?",
    )
    .bind(token)
    .bind(expiry)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to store reset token")?;
    Ok(())
}

async fn find_by_reset_token_mysql(
    pool: &MySqlPool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {}, reset_token_expiry FROM users WHERE reset_token = ?",
        USER_COLUMNS
    ))
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to look up reset token")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let expiry: Option<DateTime<Utc>> = row.get("reset_token_expiry");
    if !expiry.is_some_and(|expiry| expiry > now) {
        return Ok(None);
    }

    Ok(Some(load_user_mysql(pool, &row).await?))
}

async fn update_password_mysql(pool: &MySqlPool, user_id: i64, password_hash: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_hash = ?, reset_token = NULL, reset_token_expiry = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(password_hash)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to update password")?;
    Ok(())
}

async fn load_user_mysql(pool: &MySqlPool, row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let id: i64 = row.get("id");
    let raw: Vec<String> =
        sqlx::query_scalar("SELECT permission FROM user_permissions WHERE user_id = ?")
            .bind(id)
            .fetch_all(pool)
            .await
            .context("Failed to load permissions")?;
    Ok(row_to_user_mysql(row, parse_permissions(raw)?))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow, permissions: Vec<Permission>) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        permissions,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
