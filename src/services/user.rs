//! User service
//!
//! Implements account and session rules:
//! - Signup and signin, both handing out a signed session token
//! - Resolving the session token back to the current user
//! - Password reset by emailed single-use token
//! - Permission administration

use crate::db::is_unique_violation;
use crate::db::repositories::UserRepository;
use crate::models::{CreateUserInput, Permission, User};
use crate::services::mail::{password_reset_mail, DynMailer};
use crate::services::password::{generate_reset_token, hash_password, verify_password};
use crate::services::permissions::{has_permission, require_user, PermissionError};
use crate::services::token::TokenService;
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Permissions that unlock user administration
const USER_ADMIN_PERMISSIONS: &[Permission] = &[Permission::Admin, Permission::PermissionUpdate];

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Credentials or reset token rejected
    #[error("{0}")]
    AuthenticationError(String),

    /// Invalid input
    #[error("{0}")]
    ValidationError(String),

    /// Email already registered
    #[error("A user with email {0} already exists")]
    UserExists(String),

    /// Referenced user does not exist
    #[error("{0}")]
    NotFound(String),

    /// Caller is anonymous or lacks a permission
    #[error(transparent)]
    PermissionDenied(#[from] PermissionError),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A user together with a freshly issued session token
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub token: String,
}

/// Input for signup
#[derive(Debug, Clone)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupInput {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for completing a password reset
#[derive(Debug, Clone)]
pub struct ResetPasswordInput {
    pub reset_token: String,
    pub password: String,
    pub confirm_password: String,
}

/// User service for accounts, sessions and permissions
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    tokens: TokenService,
    mailer: DynMailer,
    frontend_url: String,
    site_name: String,
    reset_token_ttl: Duration,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, tokens: TokenService, mailer: DynMailer) -> Self {
        Self {
            user_repo,
            tokens,
            mailer,
            frontend_url: "http://localhost:7777".to_string(),
            site_name: "Storefront".to_string(),
            reset_token_ttl: Duration::hours(1),
        }
    }

    /// Base URL reset links point at
    pub fn with_frontend_url(mut self, frontend_url: impl Into<String>) -> Self {
        self.frontend_url = frontend_url.into();
        self
    }

    pub fn with_site_name(mut self, site_name: impl Into<String>) -> Self {
        self.site_name = site_name.into();
        self
    }

    pub fn with_reset_token_ttl(mut self, ttl: Duration) -> Self {
        self.reset_token_ttl = ttl;
        self
    }

    /// The token service sessions are signed with
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create an account holding the `USER` permission and sign it in.
    ///
    /// The email is trimmed and lowercased before storage. Uniqueness is left
    /// to the database constraint.
    pub async fn signup(&self, input: SignupInput) -> Result<SignedIn, UserServiceError> {
        let name = input.name.trim().to_string();
        let email = normalize_email(&input.email);

        if name.is_empty() {
            return Err(UserServiceError::ValidationError("Name is required".into()));
        }
        validate_email(&email)?;
        validate_password(&input.password)?;

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let created = self
            .user_repo
            .create(&CreateUserInput {
                name,
                email: email.clone(),
                password_hash,
                permissions: vec![Permission::User],
            })
            .await;

        let user = match created {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => return Err(UserServiceError::UserExists(email)),
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        tracing::info!(user_id = user.id, "User signed up");
        self.sign_in_user(user)
    }

    /// Check credentials and issue a session token
    pub async fn signin(&self, email: &str, password: &str) -> Result<SignedIn, UserServiceError> {
        let email = normalize_email(email);

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .ok_or_else(|| {
                UserServiceError::AuthenticationError(format!(
                    "No such user found for email {}",
                    email
                ))
            })?;

        let valid = verify_password(password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::AuthenticationError("Invalid password!".into()));
        }

        self.sign_in_user(user)
    }

    /// Sessions are stateless, so signing out only means dropping the cookie
    pub fn signout(&self) -> String {
        "Goodbye!".to_string()
    }

    /// Resolve a session token to its user.
    ///
    /// Invalid or expired tokens and tokens for deleted users all mean
    /// "anonymous"; only database failures are errors.
    pub async fn current_user(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Ignoring invalid session token: {}", e);
                return Ok(None);
            }
        };

        let user = self
            .user_repo
            .get_by_id(claims.user_id)
            .await
            .context("Failed to load session user")?;
        Ok(user)
    }

    /// Store a reset token for the user and mail them the reset link
    pub async fn request_reset(&self, email: &str) -> Result<String, UserServiceError> {
        let email = normalize_email(email);

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .ok_or_else(|| {
                UserServiceError::NotFound(format!("No such user found for email {}", email))
            })?;

        let token = generate_reset_token();
        let expiry = Utc::now() + self.reset_token_ttl;
        self.user_repo
            .set_reset_token(user.id, &token, expiry)
            .await
            .context("Failed to store reset token")?;

        let link = format!(
            "{}/reset?resetToken={}",
            self.frontend_url.trim_end_matches('/'),
            urlencoding::encode(&token)
        );
        self.mailer
            .send(password_reset_mail(&user.email, &link, &self.site_name))
            .await
            .context("Failed to send password reset email")?;

        tracing::info!(user_id = user.id, "Password reset requested");
        Ok("Thanks!".to_string())
    }

    /// Consume a reset token, set the new password and sign the user in
    pub async fn reset_password(
        &self,
        input: ResetPasswordInput,
    ) -> Result<SignedIn, UserServiceError> {
        if input.password != input.confirm_password {
            return Err(UserServiceError::ValidationError(
                "Your passwords don't match!".into(),
            ));
        }
        validate_password(&input.password)?;

        let user = self
            .user_repo
            .find_by_reset_token(&input.reset_token, Utc::now())
            .await
            .context("Failed to look up reset token")?
            .ok_or_else(|| {
                UserServiceError::AuthenticationError(
                    "This token is either invalid or expired!".into(),
                )
            })?;

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        self.user_repo
            .update_password(user.id, &password_hash)
            .await
            .context("Failed to update password")?;

        tracing::info!(user_id = user.id, "Password reset completed");
        self.sign_in_user(User {
            password_hash,
            ..user
        })
    }

    /// Replace a user's permission set wholesale
    pub async fn update_permissions(
        &self,
        actor: Option<&User>,
        user_id: i64,
        permissions: Vec<Permission>,
    ) -> Result<User, UserServiceError> {
        let actor = require_user(actor)?;
        has_permission(actor, USER_ADMIN_PERMISSIONS)?;

        self.user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::NotFound(format!("No user found with id {}", user_id)))?;

        self.user_repo
            .set_permissions(user_id, &permissions)
            .await
            .context("Failed to update permissions")?;

        tracing::info!(
            actor_id = actor.id,
            user_id,
            ?permissions,
            "Permissions updated"
        );

        self.user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to reload user")?
            .ok_or_else(|| UserServiceError::NotFound(format!("No user found with id {}", user_id)))
    }

    /// Every user, for the permissions admin page
    pub async fn list_users(&self, actor: Option<&User>) -> Result<Vec<User>, UserServiceError> {
        let actor = require_user(actor)?;
        has_permission(actor, USER_ADMIN_PERMISSIONS)?;

        Ok(self.user_repo.list().await.context("Failed to list users")?)
    }

    fn sign_in_user(&self, user: User) -> Result<SignedIn, UserServiceError> {
        let token = self
            .tokens
            .issue(user.id)
            .context("Failed to issue session token")?;
        Ok(SignedIn { user, token })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if email.is_empty() {
        return Err(UserServiceError::ValidationError("Email is required".into()));
    }
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(UserServiceError::ValidationError(
            "Please provide a valid email address".into(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.is_empty() {
        return Err(UserServiceError::ValidationError("Password is required".into()));
    }
    Ok(())
}
