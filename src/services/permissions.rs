//! Authorization checks
//!
//! Every privileged operation names the permissions that unlock it; holding
//! any one of them is enough.

use crate::models::{Permission, User};
use thiserror::Error;

/// Authorization failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("You must be logged in to do that!")]
    NotLoggedIn,

    #[error("You do not have sufficient permissions: {required}. You have: {held}")]
    Insufficient { required: String, held: String },
}

fn join(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(Permission::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Succeeds iff `user` holds at least one of `required`
pub fn has_permission(user: &User, required: &[Permission]) -> Result<(), PermissionError> {
    if user.has_any(required) {
        return Ok(());
    }
    Err(PermissionError::Insufficient {
        required: join(required),
        held: join(&user.permissions),
    })
}

/// The acting user, or an error for anonymous requests
pub fn require_user(user: Option<&User>) -> Result<&User, PermissionError> {
    user.ok_or(PermissionError::NotLoggedIn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(permissions: Vec<Permission>) -> User {
        let now = Utc::now();
        User {
            id: 1,
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            permissions,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_any_listed_permission_is_enough() {
        let u = user(vec![Permission::User, Permission::PermissionUpdate]);
        assert!(has_permission(&u, &[Permission::Admin, Permission::PermissionUpdate]).is_ok());
    }

    #[test]
    fn test_missing_permission_lists_both_sides() {
        let u = user(vec![Permission::User]);
        let err = has_permission(&u, &[Permission::Admin, Permission::ItemDelete]).unwrap_err();

        assert_eq!(
            err.to_string(),
            "You do not have sufficient permissions: ADMIN, ITEMDELETE. You have: USER"
        );
    }

    #[test]
    fn test_require_user() {
        assert_eq!(require_user(None).unwrap_err(), PermissionError::NotLoggedIn);
        assert_eq!(
            require_user(None).unwrap_err().to_string(),
            "You must be logged in to do that!"
        );

        let u = user(vec![]);
        assert_eq!(require_user(Some(&u)).unwrap().id, 1);
    }
}
