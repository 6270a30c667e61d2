//! Authentication and user management.

mod reset;
mod session;

pub use reset::{PASSWORD_RESET_PURPOSE, ResetTokenSigner};
pub use session::{SessionContext, SessionIdentity};

use crate::config::AuthConfig;
use crate::db::{Database, Role, User};
use crate::error::{AppError, Result};
use crate::mail::{Mailer, OutgoingEmail};
use crate::repository::{Page, UserRepository};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Shown for every reset request, whether or not the email is registered.
pub const RESET_REQUEST_MESSAGE: &str =
    "If that email is registered, a password reset link has been sent.";

/// Hash a password using Argon2 with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Registration input.
#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    /// Desired username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Password.
    pub password: String,
    /// Password confirmation.
    pub confirm_password: String,
}

/// Profile edit input. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    /// New username.
    pub username: Option<String>,
    /// New email.
    pub email: Option<String>,
    /// New password; requires `confirm_password`.
    pub password: Option<String>,
    /// Password confirmation.
    pub confirm_password: Option<String>,
    /// New role; admin only.
    pub role: Option<Role>,
}

/// Authentication service.
pub struct AuthService {
    users: UserRepository,
    signer: ResetTokenSigner,
    mailer: Arc<dyn Mailer>,
    session_lifetime: Duration,
    registration_enabled: bool,
    sender: String,
    base_url: String,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(
        db: Database,
        config: &AuthConfig,
        secret: &[u8],
        mailer: Arc<dyn Mailer>,
        sender: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            users: UserRepository::new(db),
            signer: ResetTokenSigner::new(
                secret,
                Duration::minutes(i64::from(config.reset_token_minutes)),
            ),
            mailer,
            session_lifetime: Duration::days(i64::from(config.session_days)),
            registration_enabled: config.registration_enabled(),
            sender: sender.into(),
            base_url: base_url.into(),
        }
    }

    /// User repository used by the service.
    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    /// Reset token signer used by the service.
    pub fn reset_signer(&self) -> &ResetTokenSigner {
        &self.signer
    }

    /// Register a new account with the `user` role.
    pub fn register(&self, form: &RegisterForm) -> Result<User> {
        if !self.registration_enabled {
            return Err(AppError::Forbidden("Registration is disabled".to_string()));
        }

        self.create_user(form, Role::User)
    }

    /// Create a new account (admin function).
    ///
    /// Username and email are checked before insert; the storage constraint
    /// still catches a concurrent duplicate as [`AppError::Conflict`].
    pub fn create_user(&self, form: &RegisterForm, role: Role) -> Result<User> {
        let username = form.username.trim();
        let email = form.email.trim();

        if username.is_empty()
            || email.is_empty()
            || form.password.is_empty()
            || form.confirm_password.is_empty()
        {
            return Err(AppError::Validation("All fields are required".to_string()));
        }

        validate_username(username)?;
        validate_email(email)?;

        if self.users.find_by_username(username)?.is_some() {
            return Err(AppError::Conflict(
                "Username already taken, choose another".to_string(),
            ));
        }

        if self.users.find_by_email(email)?.is_some() {
            return Err(AppError::Conflict(
                "Email already registered, try logging in".to_string(),
            ));
        }

        check_confirmation(&form.password, &form.confirm_password)?;

        let user = User::new(username, email, hash_password(&form.password)?, role);
        self.users.create(&user)?;

        tracing::info!(user_id = %user.id, username = %user.username, role = %user.role, "Registered user");
        Ok(user)
    }

    /// Log in with a username or email.
    pub fn login(
        &self,
        session: &mut SessionContext,
        identifier: &str,
        password: &str,
    ) -> Result<SessionIdentity> {
        self.login_at(session, identifier, password, Utc::now())
    }

    /// Log in as of `now`. Email is tried first, then username.
    pub fn login_at(
        &self,
        session: &mut SessionContext,
        identifier: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionIdentity> {
        let identifier = identifier.trim();

        let user = match self.users.find_by_email(identifier)? {
            Some(user) => Some(user),
            None => self.users.find_by_username(identifier)?,
        };

        let Some(user) = user else {
            tracing::warn!("Login failed: unknown identifier");
            return Err(AppError::InvalidCredentials);
        };

        match verify_password(password, &user.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(user_id = %user.id, "Login failed: wrong password");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Login failed: stored hash unreadable");
                return Err(AppError::InvalidCredentials);
            }
        }

        let identity = SessionIdentity::from(&user);
        session.bind(identity.clone(), now, self.session_lifetime);

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(identity)
    }

    /// Log out, clearing all session state.
    pub fn logout(&self, session: &mut SessionContext) {
        if let Some(identity) = session.identity() {
            tracing::info!(user_id = %identity.id, "User logged out");
        }
        session.clear();
    }

    /// Start a password reset.
    ///
    /// Always returns [`RESET_REQUEST_MESSAGE`]; whether the email exists and
    /// whether delivery worked are only logged.
    pub fn request_password_reset(&self, email: &str) -> &'static str {
        if let Err(e) = self.send_reset_email(email.trim()) {
            tracing::error!(error = %e, "Password reset request failed");
        }
        RESET_REQUEST_MESSAGE
    }

    fn send_reset_email(&self, email: &str) -> Result<()> {
        let Some(user) = self.users.find_by_email(email)? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = self.signer.issue(&user.email)?;
        let link = format!(
            "{}/reset_password/{}",
            self.base_url.trim_end_matches('/'),
            token
        );
        let minutes = self.signer.max_age().num_minutes();

        let message = OutgoingEmail {
            recipient: user.email.clone(),
            subject: "Password reset".to_string(),
            text_body: format!(
                "Hello {},\n\nUse this link to choose a new password:\n{}\n\nThe link expires in {} minutes.\n",
                user.username, link, minutes
            ),
            html_body: format!(
                "<p>Hello {},</p><p><a href=\"{}\">Choose a new password</a></p><p>The link expires in {} minutes.</p>",
                user.username, link, minutes
            ),
            sender: self.sender.clone(),
        };

        self.mailer.send(&message)?;
        tracing::info!(user_id = %user.id, "Password reset link sent");
        Ok(())
    }

    /// Finish a password reset.
    pub fn consume_password_reset(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        self.consume_password_reset_at(token, new_password, confirm_password, Utc::now())
    }

    /// Finish a password reset as of `now`.
    pub fn consume_password_reset_at(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let email = self.signer.verify_at(token, now)?;

        if new_password.is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }
        check_confirmation(new_password, confirm_password)?;

        let Some(mut user) = self.users.find_by_email(&email)? else {
            tracing::warn!("Reset token for an account that no longer exists");
            return Err(AppError::InvalidResetToken);
        };

        user.password_hash = hash_password(new_password)?;
        if !self.users.update(&user)? {
            return Err(AppError::NotFound(format!("User not found: {}", user.id)));
        }

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }

    /// Set a user's password directly (operator function).
    ///
    /// Returns `false` when no user has that username.
    pub fn set_password(&self, username: &str, password: &str) -> Result<bool> {
        if password.is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }

        let Some(mut user) = self.users.find_by_username(username.trim())? else {
            return Ok(false);
        };

        user.password_hash = hash_password(password)?;
        let updated = self.users.update(&user)?;
        if updated {
            tracing::info!(user_id = %user.id, "Password changed");
        }
        Ok(updated)
    }

    /// Edit an account. Non-admins may only edit themselves and never their role.
    pub fn update_account(
        &self,
        session: &SessionContext,
        user_id: &str,
        changes: &AccountUpdate,
    ) -> Result<User> {
        self.update_account_at(session, user_id, changes, Utc::now())
    }

    /// Edit an account as of `now`. An expired session counts as logged out.
    pub fn update_account_at(
        &self,
        session: &SessionContext,
        user_id: &str,
        changes: &AccountUpdate,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let actor = &current_actor(session, now)?;

        if !actor.is_admin() && actor.id != user_id {
            return Err(AppError::Forbidden(
                "You can only edit your own account".to_string(),
            ));
        }

        let mut user = self
            .users
            .get(user_id)?
            .ok_or_else(|| AppError::NotFound(format!("User not found: {}", user_id)))?;

        if let Some(username) = non_blank(changes.username.as_deref()) {
            validate_username(username)?;
            if let Some(other) = self.users.find_by_username(username)?
                && other.id != user.id
            {
                return Err(AppError::Conflict(
                    "Username already taken, choose another".to_string(),
                ));
            }
            user.username = username.to_string();
        }

        if let Some(email) = non_blank(changes.email.as_deref()) {
            validate_email(email)?;
            if let Some(other) = self.users.find_by_email(email)?
                && other.id != user.id
            {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
            user.email = email.to_string();
        }

        if let Some(password) = changes.password.as_deref().filter(|p| !p.is_empty()) {
            check_confirmation(password, changes.confirm_password.as_deref().unwrap_or(""))?;
            user.password_hash = hash_password(password)?;
        }

        if let Some(role) = changes.role
            && role != user.role
        {
            self.require_admin(actor)?;
            user.role = role;
        }

        if !self.users.update(&user)? {
            return Err(AppError::NotFound(format!("User not found: {}", user_id)));
        }

        tracing::info!(user_id = %user.id, actor = %actor.id, "Account updated");
        self.users
            .get(user_id)?
            .ok_or_else(|| AppError::NotFound(format!("User not found: {}", user_id)))
    }

    /// Delete an account. Admins may delete anyone, others only themselves.
    ///
    /// Deleting the session's own account logs it out.
    pub fn delete_account(&self, session: &mut SessionContext, user_id: &str) -> Result<bool> {
        self.delete_account_at(session, user_id, Utc::now())
    }

    /// Delete an account as of `now`. An expired session counts as logged out.
    pub fn delete_account_at(
        &self,
        session: &mut SessionContext,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let actor = current_actor(session, now)?;

        let is_self = actor.id == user_id;
        if !is_self {
            self.require_admin(&actor)?;
        }

        let deleted = self.users.delete(user_id)?;
        if deleted {
            tracing::info!(user_id, actor = %actor.id, "Account deleted");
        }
        if is_self {
            self.logout(session);
        }
        Ok(deleted)
    }

    /// List accounts (admin function).
    pub fn list_users(
        &self,
        session: &SessionContext,
        page: u32,
        per_page: u32,
    ) -> Result<Page<User>> {
        self.require_admin(&current_actor(session, Utc::now())?)?;
        self.users.list_paginated(page, per_page)
    }

    /// Fail with [`AppError::Forbidden`] unless `identity` is an admin.
    pub fn require_admin(&self, identity: &SessionIdentity) -> Result<()> {
        if identity.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator role required".to_string()))
        }
    }
}

fn current_actor(session: &SessionContext, now: DateTime<Utc>) -> Result<SessionIdentity> {
    session
        .current_identity_at(now)
        .cloned()
        .ok_or_else(|| AppError::Forbidden("Login required".to_string()))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn check_confirmation(password: &str, confirm: &str) -> Result<()> {
    if password != confirm {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<()> {
    if username.len() > 64 {
        return Err(AppError::Validation(
            "Username must be 1-64 characters".to_string(),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(AppError::Validation(
            "Username can only contain letters, numbers, '.', '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !email.contains(char::is_whitespace);
    if !valid {
        return Err(AppError::Validation(format!("Invalid email: {}", email)));
    }
    Ok(())
}
