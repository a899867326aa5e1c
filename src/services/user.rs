//! User service
//!
//! Account lifecycle: registration, sign-in, token refresh, self-service
//! profile and password management, password reset by email, and the
//! administrative operations on student and tutor accounts.

use crate::db::repositories::UserRepository;
use crate::models::{normalize_email, NewUser, ProfileUpdate, User, UserType};
use crate::services::email::{EmailService, OutgoingMail};
use crate::services::password::{hash_password, verify_password};
use crate::services::reset_token::{decode_uid, encode_uid, ResetTokenGenerator};
use crate::services::token::{TokenError, TokenPair, TokenService, TokenType};
use crate::services::validation::{FieldErrors, BLANK, REQUIRED};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";
pub const PASSWORD_MISMATCH: &str = "Password and Confirm Password doesn't match";
pub const EMAIL_TAKEN: &str = "user with this Email already exists.";
pub const INVALID_LOGIN: &str = "Email or Password is not Valid";
pub const NOT_REGISTERED: &str = "You are not a Registered User";
pub const INVALID_RESET_TOKEN: &str = "Token is not Valid or Expired";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Request data failed validation
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    /// Unknown email, wrong password or inactive account
    #[error("Email or Password is not Valid")]
    InvalidCredentials,

    /// The account has been blocked by an administrator
    #[error("User account is blocked")]
    Blocked,

    /// Missing, expired or malformed token, or a token for a deleted user
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TokenError> for UserServiceError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(e) => UserServiceError::InternalError(anyhow::Error::new(e)),
            other => UserServiceError::InvalidToken(other.to_string()),
        }
    }
}

fn validation(field: &str, message: &str) -> UserServiceError {
    UserServiceError::ValidationError(FieldErrors::single(field, message))
}

/// Input for user registration
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub email: String,
    pub name: String,
    pub password: String,
    pub password2: String,
    pub phone: Option<String>,
    pub user_type: Option<UserType>,
}

/// Input for user sign-in
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for creating a tutor account from the admin panel
#[derive(Debug, Clone, Default)]
pub struct TutorInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    pub is_blocked: bool,
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    reset_tokens: ResetTokenGenerator,
    email: Arc<EmailService>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        reset_tokens: ResetTokenGenerator,
        email: Arc<EmailService>,
    ) -> Self {
        Self {
            user_repo,
            tokens,
            reset_tokens,
            email,
        }
    }

    /// Register a new account and issue its first token pair
    pub async fn register(&self, input: RegisterInput) -> Result<(User, TokenPair), UserServiceError> {
        let mut errors = FieldErrors::new();
        errors.check_email("email", &input.email);
        errors.check_text("name", &input.name, 200);
        if input.password.is_empty() {
            errors.add("password", BLANK);
        }
        if input.user_type.is_none() {
            errors.add("user_type", REQUIRED);
        }
        if input.password != input.password2 {
            errors.add(NON_FIELD_ERRORS, PASSWORD_MISMATCH);
        }
        errors.into_result().map_err(UserServiceError::ValidationError)?;

        let email = normalize_email(&input.email);
        self.ensure_email_free(&email, None).await?;

        let user_type = input.user_type.unwrap_or(UserType::Student);
        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let mut new_user = NewUser::new(email, input.name.trim(), user_type, password_hash);
        new_user.phone = input.phone.filter(|p| !p.trim().is_empty());

        let user = self
            .user_repo
            .create(&new_user)
            .await
            .context("Failed to create user")?;
        let tokens = self.tokens.issue_pair(&user)?;

        tracing::info!(user_id = user.id, "Registered user {}", user.email);
        Ok((user, tokens))
    }

    /// Check credentials and issue a token pair
    pub async fn login(&self, input: LoginInput) -> Result<(User, TokenPair), UserServiceError> {
        let user = self
            .user_repo
            .get_by_email(&normalize_email(&input.email))
            .await
            .context("Failed to get user by email")?
            .ok_or(UserServiceError::InvalidCredentials)?;

        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid || !user.is_active {
            return Err(UserServiceError::InvalidCredentials);
        }
        if user.is_blocked {
            return Err(UserServiceError::Blocked);
        }

        let tokens = self.tokens.issue_pair(&user)?;
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new access token
    pub fn refresh(&self, refresh_token: &str) -> Result<String, UserServiceError> {
        Ok(self.tokens.refresh(refresh_token)?)
    }

    /// Resolve an access token to its user
    pub async fn authenticate(&self, access_token: &str) -> Result<User, UserServiceError> {
        let claims = self.tokens.verify(access_token, TokenType::Access)?;
        let id = claims
            .user_id()
            .ok_or_else(|| UserServiceError::InvalidToken("Token has no user".to_string()))?;
        let user = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| UserServiceError::InvalidToken("User no longer exists".to_string()))?;
        if !user.is_active {
            return Err(UserServiceError::InvalidToken("User is inactive".to_string()));
        }
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Overwrite a user's profile fields
    ///
    /// Block and admin flags are not part of a profile and are never changed here.
    pub async fn update_profile(
        &self,
        id: i64,
        mut profile: ProfileUpdate,
    ) -> Result<User, UserServiceError> {
        let mut errors = FieldErrors::new();
        errors.check_email("email", &profile.email);
        errors.check_text("name", &profile.name, 200);
        if let Some(age) = profile.age {
            if age < 0 {
                errors.add("age", "Ensure this value is greater than or equal to 0.");
            }
        }
        errors.into_result().map_err(UserServiceError::ValidationError)?;

        profile.email = normalize_email(&profile.email);
        profile.name = profile.name.trim().to_string();
        self.ensure_email_free(&profile.email, Some(id)).await?;

        self.user_repo
            .update_profile(id, &profile)
            .await
            .context("Failed to update profile")?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn change_password(
        &self,
        id: i64,
        password: &str,
        password2: &str,
    ) -> Result<(), UserServiceError> {
        validate_new_password(password, password2)?;
        let hash = hash_password(password).context("Failed to hash password")?;
        self.user_repo
            .update_password(id, &hash)
            .await
            .context("Failed to update password")?;
        Ok(())
    }

    /// Mail a password reset link to a registered address
    ///
    /// Returns the link that was sent.
    pub async fn send_password_reset(&self, email: &str) -> Result<String, UserServiceError> {
        let mut errors = FieldErrors::new();
        errors.check_email("email", email);
        errors.into_result().map_err(UserServiceError::ValidationError)?;

        let user = self
            .user_repo
            .get_by_email(&normalize_email(email))
            .await
            .context("Failed to get user by email")?
            .ok_or_else(|| validation(NON_FIELD_ERRORS, NOT_REGISTERED))?;

        let uid = encode_uid(user.id);
        let token = self.reset_tokens.make_token(&user, Utc::now())?;
        let link = self.email.reset_link(&uid, &token);
        tracing::debug!(user_id = user.id, "Password reset link: {}", link);

        self.email
            .send(&OutgoingMail::password_reset(&user.email, &link))
            .await
            .context("Failed to send password reset email")?;
        Ok(link)
    }

    /// Set a new password using the uid/token pair from a reset link
    pub async fn reset_password(
        &self,
        uid: &str,
        token: &str,
        password: &str,
        password2: &str,
    ) -> Result<(), UserServiceError> {
        validate_new_password(password, password2)?;

        let invalid = || validation(NON_FIELD_ERRORS, INVALID_RESET_TOKEN);
        let id = decode_uid(uid).ok_or_else(invalid)?;
        let user = self.get_by_id(id).await?.ok_or_else(invalid)?;
        if !self.reset_tokens.check_token(&user, token, Utc::now()) {
            return Err(invalid());
        }

        let hash = hash_password(password).context("Failed to hash password")?;
        self.user_repo
            .update_password(user.id, &hash)
            .await
            .context("Failed to update password")?;
        tracing::info!(user_id = user.id, "Password reset");
        Ok(())
    }

    /// Create an administrator account
    pub async fn create_superuser(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        let mut errors = FieldErrors::new();
        errors.check_email("email", email);
        if password.is_empty() {
            errors.add("password", BLANK);
        }
        errors.into_result().map_err(UserServiceError::ValidationError)?;

        let email = normalize_email(email);
        self.ensure_email_free(&email, None).await?;

        let hash = hash_password(password).context("Failed to hash password")?;
        let mut new_user = NewUser::new(email, name, UserType::Admin, hash);
        new_user.is_admin = true;
        let user = self
            .user_repo
            .create(&new_user)
            .await
            .context("Failed to create superuser")?;
        tracing::info!(user_id = user.id, "Created superuser {}", user.email);
        Ok(user)
    }

    /// Create the superuser unless an account with that email already exists
    pub async fn ensure_superuser(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let existing = self
            .user_repo
            .get_by_email(&normalize_email(email))
            .await
            .context("Failed to get user by email")?;
        if existing.is_some() {
            return Ok(None);
        }
        self.create_superuser(email, name, password).await.map(Some)
    }

    // ========================================================================
    // Account administration
    // ========================================================================

    pub async fn list_by_type(&self, user_type: UserType) -> Result<Vec<User>, UserServiceError> {
        Ok(self
            .user_repo
            .list_by_type(user_type)
            .await
            .context("Failed to list users")?)
    }

    /// Fetch a user only if it has the given account type
    pub async fn get_of_type(
        &self,
        id: i64,
        user_type: UserType,
    ) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .get_by_id(id)
            .await?
            .filter(|u| u.user_type == Some(user_type)))
    }

    /// Create a teacher account with a hashed password
    pub async fn create_tutor(&self, input: TutorInput) -> Result<User, UserServiceError> {
        let mut errors = FieldErrors::new();
        errors.check_email("email", &input.email);
        errors.check_text("name", &input.name, 200);
        if input.password.is_empty() {
            errors.add("password", BLANK);
        }
        errors.into_result().map_err(UserServiceError::ValidationError)?;

        let email = normalize_email(&input.email);
        self.ensure_email_free(&email, None).await?;

        let hash = hash_password(&input.password).context("Failed to hash password")?;
        let mut new_user = NewUser::new(email, input.name.trim(), UserType::Teacher, hash);
        new_user.phone = input.phone;
        new_user.age = input.age;
        new_user.address = input.address;

        let user = self
            .user_repo
            .create(&new_user)
            .await
            .context("Failed to create tutor")?;
        if input.is_blocked {
            return self.set_blocked(user.id, true).await;
        }
        Ok(user)
    }

    /// Administrative edit of an account: profile fields plus, optionally, the block flag
    pub async fn update_account(
        &self,
        id: i64,
        profile: ProfileUpdate,
        is_blocked: Option<bool>,
    ) -> Result<User, UserServiceError> {
        let user = self.update_profile(id, profile).await?;
        match is_blocked {
            Some(blocked) if blocked != user.is_blocked => self.set_blocked(id, blocked).await,
            _ => Ok(user),
        }
    }

    pub async fn set_blocked(&self, id: i64, blocked: bool) -> Result<User, UserServiceError> {
        if self.get_by_id(id).await?.is_none() {
            return Err(UserServiceError::NotFound);
        }
        self.user_repo
            .set_blocked(id, blocked)
            .await
            .context("Failed to update block status")?;
        tracing::info!(user_id = id, blocked, "User block status updated");
        self.get_by_id(id).await?.ok_or(UserServiceError::NotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, UserServiceError> {
        Ok(self
            .user_repo
            .delete(id)
            .await
            .context("Failed to delete user")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn ensure_email_free(&self, email: &str, owner: Option<i64>) -> Result<(), UserServiceError> {
        let existing = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        match existing {
            Some(user) if Some(user.id) != owner => Err(validation("email", EMAIL_TAKEN)),
            _ => Ok(()),
        }
    }
}

fn validate_new_password(password: &str, password2: &str) -> Result<(), UserServiceError> {
    let mut errors = FieldErrors::new();
    if password.is_empty() {
        errors.add("password", BLANK);
    }
    if password2.is_empty() {
        errors.add("password2", BLANK);
    }
    if password != password2 {
        errors.add(NON_FIELD_ERRORS, PASSWORD_MISMATCH);
    }
    errors.into_result().map_err(UserServiceError::ValidationError)
}

#[cfg(test)]
pub(crate) fn test_user_service(pool: crate::db::DynDatabasePool) -> UserService {
    use crate::config::{AuthConfig, MailConfig};
    use crate::db::repositories::SqlxUserRepository;

    let auth = AuthConfig {
        secret_key: "test-secret".to_string(),
        ..AuthConfig::default()
    };
    UserService::new(
        SqlxUserRepository::boxed(pool),
        Arc::new(TokenService::new(&auth)),
        ResetTokenGenerator::new(&auth.secret_key, auth.password_reset_timeout),
        Arc::new(EmailService::new(MailConfig::default())),
    )
}
