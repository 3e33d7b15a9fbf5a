//! API middleware and shared state
//!
//! Contains:
//! - `AppState`, the services shared by every handler
//! - Session resolution (token cookie or Bearer header to current user)

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Duration;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{SqlxCartItemRepository, SqlxItemRepository, SqlxUserRepository};
use crate::db::DynDatabasePool;
use crate::graphql::{create_schema, GraphQLContext, Schema};
use crate::models::User;
use crate::services::{
    CartService, DynMailer, ItemService, TokenService, UserService, SESSION_COOKIE,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub schema: Arc<Schema>,
    pub user_service: Arc<UserService>,
    pub item_service: Arc<ItemService>,
    pub cart_service: Arc<CartService>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: DynDatabasePool, config: &Config, mailer: DynMailer) -> Self {
        let tokens = TokenService::new(
            &config.auth.jwt_secret,
            config.auth.issuer.clone(),
            Duration::days(config.auth.token_ttl_days),
        );
        let user_service = UserService::new(SqlxUserRepository::boxed(pool.clone()), tokens, mailer)
            .with_frontend_url(config.server.frontend_url.clone())
            .with_site_name(config.mail.site_name.clone())
            .with_reset_token_ttl(Duration::minutes(config.auth.reset_token_ttl_minutes));

        let item_repo = SqlxItemRepository::boxed(pool.clone());
        let item_service = ItemService::new(item_repo.clone()).with_per_page(config.shop.per_page);
        let cart_service = CartService::new(SqlxCartItemRepository::boxed(pool.clone()), item_repo);

        Self {
            pool,
            schema: Arc::new(create_schema()),
            user_service: Arc::new(user_service),
            item_service: Arc::new(item_service),
            cart_service: Arc::new(cart_service),
        }
    }

    /// Fresh per-request GraphQL context
    pub fn graphql_context(&self, current_user: Option<User>) -> GraphQLContext {
        GraphQLContext::new(
            self.user_service.clone(),
            self.item_service.clone(),
            self.cart_service.clone(),
            current_user,
        )
    }
}

/// The user behind the request's session token, if any
#[derive(Debug, Clone, Default)]
pub struct SessionUser(pub Option<User>);

/// Extract session token from request
fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    let cookie_header = request.headers().get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|cookie| {
        let (name, value) = cookie.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Session middleware
///
/// Never rejects: a missing, expired or forged token makes the request
/// anonymous.
pub async fn resolve_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut user = None;
    if let Some(token) = extract_session_token(&request) {
        match state.user_service.current_user(&token).await {
            Ok(found) => user = found,
            Err(e) => tracing::warn!("Failed to resolve session: {}", e),
        }
    }

    request.extensions_mut().insert(SessionUser(user));
    next.run(request).await
}
