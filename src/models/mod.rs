//! Data models
//!
//! This module contains the data structures shared by the storefront layers:
//! - Database entities (User, Item, CartItem)
//! - The Permission enum gating privileged operations
//! - Input types for creating and updating entities

mod cart_item;
mod item;
mod user;

pub use cart_item::{CartItem, CartLine};
pub use item::{CreateItemInput, Item, UpdateItemInput};
pub use user::{CreateUserInput, Permission, User};
