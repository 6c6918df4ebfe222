use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::auth::{hash_fingerprint, hash_password, verify_password, PasswordError, TokenError, TokenService};
use crate::database::models::User;
use crate::database::{Store, StoreError};
use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Required(&'static str),

    #[error("validation failed")]
    Invalid {
        errors: ValidationErrors,
        order: &'static [&'static str],
    },

    #[error("User already exists with this email")]
    EmailTaken,

    #[error("User not found")]
    UnknownUser,

    #[error("Invalid credentials")]
    BadPassword,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Invalid token type")]
    WrongTokenType,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Required(msg) => ApiError::bad_request(msg),
            AuthError::Invalid { errors, order } => ApiError::from_validation(&errors, order),
            AuthError::EmailTaken => ApiError::conflict(err.to_string()),
            AuthError::UnknownUser => ApiError::not_found(err.to_string()),
            AuthError::BadPassword => ApiError::unauthorized(err.to_string()),
            AuthError::InvalidResetToken | AuthError::WrongTokenType => ApiError::bad_request(err.to_string()),
            AuthError::Store(e) => ApiError::from(e),
            AuthError::Password(e) => ApiError::from(e),
            AuthError::Token(e) => ApiError::from(e),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterInput {
    #[serde(default)]
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginInput {
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgotPasswordInput {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInput {
    #[serde(default)]
    pub reset_token: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// Emails are stored and compared lowercased and trimmed.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration, login and password reset.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    /// Creates the account and returns it with a session token.
    pub async fn register(&self, mut input: RegisterInput) -> Result<(User, String), AuthError> {
        if input.name.is_empty() || input.email.is_empty() || input.password.is_empty() {
            return Err(AuthError::Required("All fields are required"));
        }
        input.name = input.name.trim().to_string();
        input.email = input.email.trim().to_string();
        input.validate().map_err(|errors| AuthError::Invalid {
            errors,
            order: &["name", "email", "password"],
        })?;

        let email = normalize_email(&input.email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let hash = hash_password(&input.password)?;
        let user = match self.store.insert_user(User::new(input.name, email, hash)).await {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => return Err(AuthError::EmailTaken),
            Err(e) => return Err(e.into()),
        };

        let token = self.tokens.issue_session(user.id)?;
        tracing::info!("Registered user {}", user.id);
        Ok((user, token))
    }

    pub async fn login(&self, mut input: LoginInput) -> Result<(User, String), AuthError> {
        if input.email.is_empty() || input.password.is_empty() {
            return Err(AuthError::Required("Email and password are required"));
        }
        input.email = input.email.trim().to_string();
        input.validate().map_err(|errors| AuthError::Invalid {
            errors,
            order: &["email"],
        })?;

        let user = self
            .store
            .find_user_by_email(&normalize_email(&input.email))
            .await?
            .ok_or(AuthError::UnknownUser)?;

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!("Password mismatch for user {}", user.id);
            return Err(AuthError::BadPassword);
        }

        let token = self.tokens.issue_session(user.id)?;
        Ok((user, token))
    }

    /// Issues a reset token bound to the user's current password hash.
    pub async fn forgot_password(&self, input: ForgotPasswordInput) -> Result<String, AuthError> {
        if input.email.trim().is_empty() {
            return Err(AuthError::Required("Email is required"));
        }
        let user = self
            .store
            .find_user_by_email(&normalize_email(&input.email))
            .await?
            .ok_or(AuthError::UnknownUser)?;

        Ok(self.tokens.issue_reset(user.id, &user.password_hash)?)
    }

    /// Sets a new password. The token stops working once the password has changed.
    pub async fn reset_password(&self, input: ResetPasswordInput) -> Result<(), AuthError> {
        if input.reset_token.is_empty() || input.new_password.is_empty() {
            return Err(AuthError::Required("Reset token and new password are required"));
        }
        input.validate().map_err(|errors| AuthError::Invalid {
            errors,
            order: &["new_password"],
        })?;

        let claims = self.tokens.verify_reset(&input.reset_token).map_err(|e| match e {
            TokenError::WrongKind => AuthError::WrongTokenType,
            _ => AuthError::InvalidResetToken,
        })?;

        let user = self
            .store
            .find_user(claims.user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;
        if claims.fp.as_deref() != Some(hash_fingerprint(&user.password_hash).as_str()) {
            return Err(AuthError::InvalidResetToken);
        }

        let hash = hash_password(&input.new_password)?;
        if !self.store.update_password(user.id, &hash).await? {
            return Err(AuthError::UnknownUser);
        }
        tracing::info!("Password reset for user {}", user.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::MemoryStore;

    fn service() -> AuthService {
        let tokens = Arc::new(TokenService::new(&AppConfig::development().security));
        AuthService::new(Arc::new(MemoryStore::new()), tokens)
    }

    fn signup(name: &str, email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn message(err: AuthError) -> String {
        ApiError::from(err).message().to_string()
    }

    #[tokio::test]
    async fn register_checks_fields_in_order() {
        let auth = service();
        assert_eq!(message(auth.register(signup("", "a@b.co", "secret")).await.unwrap_err()), "All fields are required");
        assert_eq!(
            message(auth.register(signup(" a ", "nope", "123")).await.unwrap_err()),
            "Name must be at least 2 characters"
        );
        assert_eq!(message(auth.register(signup("Ada", "nope", "123")).await.unwrap_err()), "Invalid email format");
        assert_eq!(
            message(auth.register(signup("Ada", "ada@example.com", "123")).await.unwrap_err()),
            "Password must be at least 6 characters"
        );
    }

    #[tokio::test]
    async fn emails_are_case_insensitive() {
        let auth = service();
        let (user, _) = auth.register(signup("Ada", " Ada@Example.com ", "secret1")).await.unwrap();
        assert_eq!(user.email, "ada@example.com");

        let err = auth.register(signup("Imposter", "ADA@example.com", "secret2")).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));

        let login = LoginInput {
            email: "ADA@EXAMPLE.COM".into(),
            password: "secret1".into(),
        };
        assert_eq!(auth.login(login).await.unwrap().0.id, user.id);
    }

    #[tokio::test]
    async fn login_distinguishes_unknown_user_from_bad_password() {
        let auth = service();
        auth.register(signup("Ada", "ada@example.com", "secret1")).await.unwrap();

        let unknown = LoginInput {
            email: "bo@example.com".into(),
            password: "secret1".into(),
        };
        assert!(matches!(auth.login(unknown).await, Err(AuthError::UnknownUser)));

        let wrong = LoginInput {
            email: "ada@example.com".into(),
            password: "secret2".into(),
        };
        assert!(matches!(auth.login(wrong).await, Err(AuthError::BadPassword)));
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let auth = service();
        auth.register(signup("Ada", "ada@example.com", "secret1")).await.unwrap();
        let token = auth
            .forgot_password(ForgotPasswordInput {
                email: "ada@example.com".into(),
            })
            .await
            .unwrap();

        let reset = |password: &str| ResetPasswordInput {
            reset_token: token.clone(),
            new_password: password.into(),
        };
        auth.reset_password(reset("secret2")).await.unwrap();
        assert!(matches!(auth.reset_password(reset("secret3")).await, Err(AuthError::InvalidResetToken)));

        let login = LoginInput {
            email: "ada@example.com".into(),
            password: "secret2".into(),
        };
        assert!(auth.login(login).await.is_ok());
    }

    #[tokio::test]
    async fn session_tokens_cannot_reset_passwords() {
        let auth = service();
        let (_, session) = auth.register(signup("Ada", "ada@example.com", "secret1")).await.unwrap();
        let err = auth
            .reset_password(ResetPasswordInput {
                reset_token: session,
                new_password: "secret2".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WrongTokenType));

        let err = auth
            .reset_password(ResetPasswordInput {
                reset_token: "garbage".into(),
                new_password: "secret2".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidResetToken));
    }
}
