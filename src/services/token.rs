//! JWT issuance and verification
//!
//! Access and refresh tokens are HS256 JWTs signed with `auth.secret_key`.
//! The `token_type` claim keeps a refresh token from being accepted where an
//! access token is expected, and vice versa.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::User;

/// Subject used for tokens minted by the admin sign-in endpoint
pub const ADMIN_SUBJECT: &str = "admin";

/// Lifetime of the admin session token and its cookie, in seconds
pub const ADMIN_TOKEN_LIFETIME: i64 = 24 * 60 * 60;

/// Role carried in a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Tutor,
    Admin,
}

impl Role {
    pub fn for_user(user: &User) -> Self {
        if user.is_admin {
            Role::Admin
        } else if user.is_teacher() {
            Role::Tutor
        } else {
            Role::User
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    /// The user id, or `None` for the admin session subject
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Refresh + access pair returned by register and sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token is invalid")]
    Invalid,

    #[error("Token has wrong type")]
    WrongType,

    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Signs and checks JWTs
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret_key.as_bytes()),
            validation,
            access_lifetime: Duration::seconds(config.access_token_lifetime),
            refresh_lifetime: Duration::seconds(config.refresh_token_lifetime),
        }
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        let role = Role::for_user(user);
        let sub = user.id.to_string();
        Ok(TokenPair {
            refresh: self.issue(&sub, role, TokenType::Refresh, self.refresh_lifetime)?,
            access: self.issue(&sub, role, TokenType::Access, self.access_lifetime)?,
        })
    }

    /// Token stored in the admin session cookie
    pub fn issue_admin(&self) -> Result<String, TokenError> {
        self.issue(
            ADMIN_SUBJECT,
            Role::Admin,
            TokenType::Access,
            Duration::seconds(ADMIN_TOKEN_LIFETIME),
        )
    }

    /// Decode and validate a token of the expected type
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        if data.claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(data.claims)
    }

    /// Exchange a refresh token for a fresh access token
    pub fn refresh(&self, refresh_token: &str) -> Result<String, TokenError> {
        let claims = self.verify(refresh_token, TokenType::Refresh)?;
        self.issue(&claims.sub, claims.role, TokenType::Access, self.access_lifetime)
    }

    fn issue(
        &self,
        sub: &str,
        role: Role,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            role,
            token_type,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Signing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_user, UserType};

    fn service() -> TokenService {
        TokenService::new(&AuthConfig {
            secret_key: "test-secret".to_string(),
            ..AuthConfig::default()
        })
    }

    #[test]
    fn test_pair_roundtrip() {
        let svc = service();
        let user = sample_user(42, UserType::Teacher);
        let pair = svc.issue_pair(&user).unwrap();

        let access = svc.verify(&pair.access, TokenType::Access).unwrap();
        assert_eq!(access.user_id(), Some(42));
        assert_eq!(access.role, Role::Tutor);
        assert!(access.exp > access.iat);

        let refresh = svc.verify(&pair.refresh, TokenType::Refresh).unwrap();
        assert_eq!(refresh.sub, "42");
        assert_ne!(refresh.jti, access.jti);
    }

    #[test]
    fn test_type_confusion_rejected() {
        let svc = service();
        let pair = svc.issue_pair(&sample_user(1, UserType::Student)).unwrap();

        assert!(matches!(svc.verify(&pair.refresh, TokenType::Access), Err(TokenError::WrongType)));
        assert!(matches!(svc.verify(&pair.access, TokenType::Refresh), Err(TokenError::WrongType)));
        assert!(svc.refresh(&pair.access).is_err());
    }

    #[test]
    fn test_refresh_issues_access() {
        let svc = service();
        let pair = svc.issue_pair(&sample_user(7, UserType::Student)).unwrap();
        let access = svc.refresh(&pair.refresh).unwrap();
        let claims = svc.verify(&access, TokenType::Access).unwrap();
        assert_eq!(claims.user_id(), Some(7));
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn test_expired_token() {
        let svc = TokenService::new(&AuthConfig {
            access_token_lifetime: -120,
            ..AuthConfig::default()
        });
        let pair = svc.issue_pair(&sample_user(1, UserType::Student)).unwrap();
        assert!(matches!(svc.verify(&pair.access, TokenType::Access), Err(TokenError::Expired)));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let other = TokenService::new(&AuthConfig {
            secret_key: "someone-else".to_string(),
            ..AuthConfig::default()
        });
        let pair = other.issue_pair(&sample_user(1, UserType::Student)).unwrap();
        assert!(matches!(service().verify(&pair.access, TokenType::Access), Err(TokenError::Invalid)));
        assert!(matches!(service().verify("garbage", TokenType::Access), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_admin_token() {
        let svc = service();
        let token = svc.issue_admin().unwrap();
        let claims = svc.verify(&token, TokenType::Access).unwrap();
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.sub, ADMIN_SUBJECT);
        assert_eq!(claims.user_id(), None);
    }

    #[test]
    fn test_admin_user_role() {
        let mut user = sample_user(3, UserType::Student);
        user.is_admin = true;
        assert_eq!(Role::for_user(&user), Role::Admin);
    }
}
