//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a specific entity.

pub mod cart_item;
pub mod item;
pub mod user;

pub use cart_item::{CartItemRepository, SqlxCartItemRepository};
pub use item::{ItemRepository, SqlxItemRepository};
pub use user::{SqlxUserRepository, UserRepository};
