//! Services layer - Business logic
//!
//! Services own the storefront's rules:
//! - Authentication and session token issuance
//! - Permission checks in front of privileged operations
//! - Catalogue management and the cart merge
//!
//! Each service talks to the database only through repository traits, so the
//! whole layer runs against in-memory SQLite in tests.

pub mod cart;
pub mod item;
pub mod mail;
pub mod password;
pub mod permissions;
pub mod token;
pub mod user;

pub use cart::{CartService, CartServiceError};
pub use item::{ItemService, ItemServiceError};
pub use mail::{mailer_from_config, DynMailer, LogMailer, Mailer, OutgoingMail, SmtpMailer};
pub use password::{hash_password, verify_password};
pub use permissions::{has_permission, require_user, PermissionError};
pub use token::{clear_session_cookie, session_cookie, Claims, TokenService, SESSION_COOKIE};
pub use user::{ResetPasswordInput, SignedIn, SignupInput, UserService, UserServiceError};
