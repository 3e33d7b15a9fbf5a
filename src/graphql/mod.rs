//! GraphQL layer
//!
//! juniper schema over the services. Resolvers stay thin: parse arguments,
//! call one service method, wrap the result in an object type.

pub mod context;
pub mod error;
pub mod schema;
pub mod types;

pub use context::{CookieAction, GraphQLContext};
pub use schema::{create_schema, Mutation, Query, Schema};
