//! Access and refresh JWTs.
//!
//! Both kinds are HS256 tokens carrying `{sub, role, exp, iat, typ}` but are
//! signed with different secrets, and `typ` is checked on decode, so a refresh
//! token can never be presented as an access token or vice versa.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use novare_core::{Role, UserId};

use crate::config::JwtConfig;

/// Which secret a token was signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string.
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub typ: TokenKind,
}

impl Claims {
    /// The user id in `sub`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if `sub` is not a user id.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Invalid)
    }
}

/// Errors issuing or checking tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid,
        }
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Keys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Issues and verifies JWTs.
pub struct TokenService {
    access: Keys,
    refresh: Keys,
    validation: Validation,
}

impl TokenService {
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: Keys::new(config.access_secret.expose_secret(), config.access_ttl),
            refresh: Keys::new(config.refresh_secret.expose_secret(), config.refresh_ttl),
            validation,
        }
    }

    const fn keys(&self, kind: TokenKind) -> &Keys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Sign a token of the given kind.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue(&self, kind: TokenKind, user_id: UserId, role: Role) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(keys.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: iat.saturating_add(ttl),
            iat,
            typ: kind,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(TokenError::Signing)
    }

    /// Sign an access and a refresh token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue_pair(&self, user_id: UserId, role: Role) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue(TokenKind::Access, user_id, role)?,
            refresh_token: self.issue(TokenKind::Refresh, user_id, role)?,
        })
    }

    /// Verify a token of the expected kind.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)?;
        if data.claims.typ != kind {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }
}

/// SHA-256 hex digest of a token, for storage.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn service() -> TokenService {
        TokenService::new(&JwtConfig {
            access_secret: SecretString::from("a8Kq2mZr7Tx4Wv9Lp3Hn6Bc1Df5Gj0Ys"),
            refresh_secret: SecretString::from("R4t9Qm2Xc7Vb1Nz6Lk3Jh8Gf5Ds0Pa2Wq"),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(604_800),
        })
    }

    #[test]
    fn test_access_token_verifies() {
        let tokens = service();
        let token = tokens.issue(TokenKind::Access, UserId::new(7), Role::Admin).unwrap();
        let claims = tokens.verify(TokenKind::Access, &token).unwrap();
        assert_eq!(claims.user_id().unwrap(), UserId::new(7));
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let tokens = service();
        let pair = tokens.issue_pair(UserId::new(7), Role::User).unwrap();
        assert!(matches!(
            tokens.verify(TokenKind::Access, &pair.refresh_token),
            Err(TokenError::Invalid)
        ));
        assert!(tokens.verify(TokenKind::Refresh, &pair.refresh_token).is_ok());
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            service().verify(TokenKind::Access, "not.a.jwt"),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token() {
        let tokens = TokenService::new(&JwtConfig {
            access_secret: SecretString::from("a8Kq2mZr7Tx4Wv9Lp3Hn6Bc1Df5Gj0Ys"),
            refresh_secret: SecretString::from("R4t9Qm2Xc7Vb1Nz6Lk3Jh8Gf5Ds0Pa2Wq"),
            access_ttl: Duration::ZERO,
            refresh_ttl: Duration::ZERO,
        });
        let claims = Claims {
            sub: "1".to_owned(),
            role: Role::User,
            exp: Utc::now().timestamp() - 60,
            iat: Utc::now().timestamp() - 120,
            typ: TokenKind::Access,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &tokens.access.encoding,
        )
        .unwrap();
        assert!(matches!(
            tokens.verify(TokenKind::Access, &token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let hash = hash_token("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("abc"));
        assert_ne!(hash, hash_token("abd"));
    }
}
