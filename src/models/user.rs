//! User model
//!
//! This module defines the User entity and the permission strings that gate
//! privileged operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered shopper or administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Email address (unique, stored lowercased)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Permissions held by the user
    pub permissions: Vec<Permission>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Check whether the user holds at least one of the given permissions
    pub fn has_any(&self, required: &[Permission]) -> bool {
        self.permissions.iter().any(|held| required.contains(held))
    }
}

/// Permission held by a user.
///
/// Stored and exposed as the upper-case name (`ADMIN`, `ITEMCREATE`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, juniper::GraphQLEnum,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    #[graphql(name = "ADMIN")]
    Admin,
    #[graphql(name = "USER")]
    User,
    #[graphql(name = "ITEMCREATE")]
    ItemCreate,
    #[graphql(name = "ITEMUPDATE")]
    ItemUpdate,
    #[graphql(name = "ITEMDELETE")]
    ItemDelete,
    #[graphql(name = "PERMISSIONUPDATE")]
    PermissionUpdate,
}

impl Permission {
    /// Every permission, in declaration order
    pub const ALL: [Permission; 6] = [
        Permission::Admin,
        Permission::User,
        Permission::ItemCreate,
        Permission::ItemUpdate,
        Permission::ItemDelete,
        Permission::PermissionUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Admin => "ADMIN",
            Permission::User => "USER",
            Permission::ItemCreate => "ITEMCREATE",
            Permission::ItemUpdate => "ITEMUPDATE",
            Permission::ItemDelete => "ITEMDELETE",
            Permission::PermissionUpdate => "PERMISSIONUPDATE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("Invalid permission: {}", s))
    }
}

/// Input for creating a new user (password already hashed)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub permissions: Vec<Permission>,
}
