//! Mapping from service errors to GraphQL field errors
//!
//! Every field error carries a `code` extension so clients can branch on the
//! failure kind without parsing messages. Internal errors are logged here and
//! never reach the client verbatim.

use crate::services::{CartServiceError, ItemServiceError, PermissionError, UserServiceError};
use juniper::{FieldError, Object, Value};

pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
pub const FORBIDDEN: &str = "FORBIDDEN";
pub const BAD_USER_INPUT: &str = "BAD_USER_INPUT";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const CONFLICT: &str = "CONFLICT";
pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";

const INTERNAL_MESSAGE: &str = "Something went wrong, please try again";

/// A service error that knows which client-facing code it maps to
pub trait ClientError: std::fmt::Display {
    fn code(&self) -> &'static str;

    fn is_internal(&self) -> bool {
        self.code() == INTERNAL_SERVER_ERROR
    }
}

impl ClientError for PermissionError {
    fn code(&self) -> &'static str {
        match self {
            PermissionError::NotLoggedIn => UNAUTHENTICATED,
            PermissionError::Insufficient { .. } => FORBIDDEN,
        }
    }
}

impl ClientError for UserServiceError {
    fn code(&self) -> &'static str {
        match self {
            UserServiceError::AuthenticationError(_) => UNAUTHENTICATED,
            UserServiceError::ValidationError(_) => BAD_USER_INPUT,
            UserServiceError::UserExists(_) => CONFLICT,
            UserServiceError::NotFound(_) => NOT_FOUND,
            UserServiceError::PermissionDenied(e) => e.code(),
            UserServiceError::InternalError(_) => INTERNAL_SERVER_ERROR,
        }
    }
}

impl ClientError for ItemServiceError {
    fn code(&self) -> &'static str {
        match self {
            ItemServiceError::ValidationError(_) => BAD_USER_INPUT,
            ItemServiceError::NotFound => NOT_FOUND,
            ItemServiceError::PermissionDenied(e) => e.code(),
            ItemServiceError::InternalError(_) => INTERNAL_SERVER_ERROR,
        }
    }
}

impl ClientError for CartServiceError {
    fn code(&self) -> &'static str {
        match self {
            CartServiceError::ItemNotFound | CartServiceError::CartItemNotFound => NOT_FOUND,
            CartServiceError::NotOwner => FORBIDDEN,
            CartServiceError::PermissionDenied(e) => e.code(),
            CartServiceError::InternalError(_) => INTERNAL_SERVER_ERROR,
        }
    }
}

/// Build a field error with a `code` extension
pub fn coded_error(message: impl std::fmt::Display, code: &str) -> FieldError {
    let mut extensions = Object::with_capacity(1);
    extensions.add_field("code", Value::scalar(code.to_string()));
    FieldError::new(message, Value::Object(extensions))
}

/// Convert a service error for the GraphQL error channel
pub fn field_error<E: ClientError>(err: E) -> FieldError {
    if err.is_internal() {
        tracing::error!("GraphQL resolver failed: {}", err);
        return coded_error(INTERNAL_MESSAGE, INTERNAL_SERVER_ERROR);
    }
    coded_error(&err, err.code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Permission;
    use juniper::graphql_value;

    #[test]
    fn test_permission_errors_map_to_auth_codes() {
        let err = field_error(UserServiceError::from(PermissionError::NotLoggedIn));
        assert_eq!(err.message(), "You must be logged in to do that!");
        assert_eq!(err.extensions(), &graphql_value!({ "code": "UNAUTHENTICATED" }));

        let err = field_error(ItemServiceError::from(PermissionError::Insufficient {
            required: Permission::ItemDelete.to_string(),
            held: Permission::User.to_string(),
        }));
        assert_eq!(err.extensions(), &graphql_value!({ "code": "FORBIDDEN" }));
    }

    #[test]
    fn test_user_facing_messages_pass_through() {
        let err = field_error(UserServiceError::UserExists("a@b.com".into()));
        assert_eq!(err.message(), "A user with email a@b.com already exists");
        assert_eq!(err.extensions(), &graphql_value!({ "code": "CONFLICT" }));

        let err = field_error(CartServiceError::NotOwner);
        assert_eq!(err.extensions(), &graphql_value!({ "code": "FORBIDDEN" }));
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = field_error(ItemServiceError::InternalError(anyhow::anyhow!(
            "database is locked"
        )));
        assert_eq!(err.message(), INTERNAL_MESSAGE);
        assert_eq!(
            err.extensions(),
            &graphql_value!({ "code": "INTERNAL_SERVER_ERROR" })
        );
    }
}
