//! Per-request GraphQL context

use crate::models::User;
use crate::services::{CartService, ItemService, UserService};
use std::sync::{Arc, Mutex};

/// What the HTTP layer should do with the session cookie after execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieAction {
    /// Store a freshly issued session token
    Set(String),
    /// Drop the session cookie
    Clear,
}

pub struct GraphQLContext {
    pub users: Arc<UserService>,
    pub items: Arc<ItemService>,
    pub carts: Arc<CartService>,
    /// Resolved by the session middleware; `None` for anonymous requests
    pub current_user: Option<User>,
    cookie: Mutex<Option<CookieAction>>,
}

impl GraphQLContext {
    pub fn new(
        users: Arc<UserService>,
        items: Arc<ItemService>,
        carts: Arc<CartService>,
        current_user: Option<User>,
    ) -> Self {
        Self {
            users,
            items,
            carts,
            current_user,
            cookie: Mutex::new(None),
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    /// Record a session token to hand back as a cookie. The last call wins.
    pub fn set_session(&self, token: String) {
        self.record(CookieAction::Set(token));
    }

    pub fn clear_session(&self) {
        self.record(CookieAction::Clear);
    }

    /// Take the pending cookie action, leaving none behind
    pub fn take_cookie_action(&self) -> Option<CookieAction> {
        self.cookie
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn record(&self, action: CookieAction) {
        let mut slot = self
            .cookie
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(action);
    }
}

impl juniper::Context for GraphQLContext {}
