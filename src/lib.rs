//! Storefront - GraphQL shop backend
//!
//! Items, per-user carts and permissioned administration behind a juniper
//! schema served by axum.

pub mod api;
pub mod config;
pub mod db;
pub mod graphql;
pub mod models;
pub mod services;
