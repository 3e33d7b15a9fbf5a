//! Cart item model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Item;

/// One line of a user's cart. A user has at most one row per item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub quantity: i64,
    pub item_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A cart row joined with the item it points at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub cart_item: CartItem,
    pub item: Item,
}

impl CartLine {
    /// Line total in cents
    pub fn subtotal(&self) -> i64 {
        self.cart_item.quantity * self.item.price
    }
}
