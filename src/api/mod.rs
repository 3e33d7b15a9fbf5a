//! API layer - HTTP handlers and routing
//!
//! - `POST /graphql` executes queries and mutations
//! - `GET /graphql` serves GraphiQL
//! - `GET /health` pings the database

pub mod graphql;
pub mod health;
pub mod middleware;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{AppState, SessionUser};

/// Build the complete router with middleware
///
/// CORS admits only the storefront frontend, with credentials so the session
/// cookie travels.
pub fn build_router(state: AppState, frontend_origin: &str) -> anyhow::Result<Router> {
    let origin = frontend_origin
        .trim_end_matches('/')
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid frontend origin: {}", frontend_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    Ok(Router::new()
        .route(
            "/graphql",
            get(graphql::graphiql).post(graphql::graphql_handler),
        )
        .route("/health", get(health::health))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_session,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
