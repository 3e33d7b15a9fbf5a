//! Database migrations module
//!
//! Migrations are embedded directly in the binary as SQL strings, with one
//! variant for SQLite and one for MySQL. Applied versions are recorded in the
//! `_migrations` table so each migration runs exactly once.
//!
//! ```ignore
//! use storefront::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All storefront migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                reset_token VARCHAR(64),
                reset_token_expiry TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_reset_token ON users(reset_token);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                reset_token VARCHAR(64),
                reset_token_expiry TIMESTAMP NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                INDEX idx_users_reset_token (reset_token)
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_user_permissions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS user_permissions (
                user_id INTEGER NOT NULL,
                permission VARCHAR(32) NOT NULL,
                PRIMARY KEY (user_id, permission),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS user_permissions (
                user_id BIGINT NOT NULL,
                permission VARCHAR(32) NOT NULL,
                PRIMARY KEY (user_id, permission),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 3,
        name: "create_items",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                description TEXT NOT NULL,
                image VARCHAR(500),
                large_image VARCHAR(500),
                price INTEGER NOT NULL,
                search_text TEXT NOT NULL DEFAULT '',
                user_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_items_user_id ON items(user_id);
            CREATE INDEX IF NOT EXISTS idx_items_created_at ON items(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS items (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                description TEXT NOT NULL,
                image VARCHAR(500),
                large_image VARCHAR(500),
                price INT NOT NULL,
                search_text TEXT NOT NULL,
                user_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                INDEX idx_items_user_id (user_id),
                INDEX idx_items_created_at (created_at),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 4,
        name: "create_cart_items",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS cart_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quantity INTEGER NOT NULL DEFAULT 1,
                item_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, item_id),
                FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_cart_items_user_id ON cart_items(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS cart_items (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                quantity INT NOT NULL DEFAULT 1,
                item_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_cart_items_user_item (user_id, item_id),
                INDEX idx_cart_items_user_id (user_id),
                FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
];

/// Run all pending migrations, returning how many were applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(pool.sqlite()?).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(pool.mysql()?).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows =
        sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows =
        sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get::<i32, _>("version") as i64,
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_migration_sqlite(pool.sqlite()?, migration).await,
        DatabaseDriver::Mysql => apply_migration_mysql(pool.mysql()?, migration).await,
    }
}

/// SQLite DDL is transactional: a failing statement leaves no trace.
async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    apply_sqlite_statements(pool, migration.version, migration.name, migration.up_sqlite).await
}

async fn apply_sqlite_statements(
    pool: &SqlitePool,
    version: i32,
    name: &str,
    sql: &str,
) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin migration transaction")?;

    for statement in split_sql_statements(sql) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(version)
        .bind(name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await.context("Failed to commit migration")?;
    Ok(())
}

/// MySQL commits implicitly after every DDL statement, so a transaction cannot
/// undo a half-applied migration. Every MySQL statement is written to be
/// re-runnable instead (`CREATE TABLE IF NOT EXISTS` with inline indexes).
async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual non-empty statements, dropping comment-only chunks
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &SqlitePool, email: &str) -> i64 {
        sqlx::query("INSERT INTO users (name, email, password_hash) VALUES (?, ?, ?)")
            .bind("Someone")
            .bind(email)
            .bind("hash")
            .execute(pool)
            .await
            .expect("Failed to insert user")
            .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let first = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(first, MIGRATIONS.len());

        let second = run_migrations(&pool).await.expect("Failed to rerun migrations");
        assert_eq!(second, 0);

        let recorded = get_applied_migrations(&pool).await.unwrap();
        assert_eq!(recorded.len(), MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_email_unique_constraint() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();

        insert_user(sqlite, "same@example.com").await;
        let result = sqlx::query("INSERT INTO users (name, email, password_hash) VALUES (?, ?, ?)")
            .bind("Other")
            .bind("same@example.com")
            .bind("hash")
            .execute(sqlite)
            .await;

        let err = result.expect_err("Duplicate email must be rejected");
        assert!(crate::db::is_unique_violation(&anyhow::Error::new(err)));
    }

    #[tokio::test]
    async fn test_cart_item_unique_per_user_and_item() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();

        let user_id = insert_user(sqlite, "cart@example.com").await;
        let item_id = sqlx::query(
            "INSERT INTO items (title, description, price, user_id) VALUES ('Hat', 'A hat', 1000, ?)",
        )
        .bind(user_id)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();

        let insert = "INSERT INTO cart_items (item_id, user_id) VALUES (?, ?)";
        sqlx::query(insert).bind(item_id).bind(user_id).execute(sqlite).await.unwrap();
        let dup = sqlx::query(insert).bind(item_id).bind(user_id).execute(sqlite).await;

        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_deleting_item_removes_cart_rows() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();

        let user_id = insert_user(sqlite, "cascade@example.com").await;
        let item_id = sqlx::query(
            "INSERT INTO items (title, description, price, user_id) VALUES ('Mug', 'A mug', 500, ?)",
        )
        .bind(user_id)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        sqlx::query("INSERT INTO cart_items (item_id, user_id) VALUES (?, ?)")
            .bind(item_id)
            .bind(user_id)
            .execute(sqlite)
            .await
            .unwrap();

        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(item_id)
            .execute(sqlite)
            .await
            .unwrap();

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items")
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql).len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);\n-- trailing";
        assert_eq!(split_sql_statements(sql_with_comments).len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }

    #[tokio::test]
    async fn test_failed_sqlite_migration_rolls_back() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();

        let sql = "CREATE TABLE half_done (id INTEGER); INSERT INTO no_such_table VALUES (1);";
        let result = apply_sqlite_statements(sqlite, 99, "broken", sql).await;
        assert!(result.is_err());

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'half_done'",
        )
        .fetch_one(sqlite)
        .await
        .unwrap();
        assert_eq!(tables, 0);

        let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations WHERE version = 99")
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(recorded, 0);

        apply_sqlite_statements(sqlite, 99, "fixed", "CREATE TABLE half_done (id INTEGER);")
            .await
            .expect("Retry after rollback should succeed");
    }

    #[test]
    fn test_mysql_statements_are_rerunnable() {
        for migration in MIGRATIONS {
            for statement in split_sql_statements(migration.up_mysql) {
                assert!(
                    statement.starts_with("CREATE TABLE IF NOT EXISTS"),
                    "{} has a statement that fails on rerun: {}",
                    migration.name,
                    truncate_sql(statement)
                );
            }
        }
    }

    #[test]
    fn test_migration_versions_are_sequential() {
        for (idx, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, idx + 1);
        }
    }
}
