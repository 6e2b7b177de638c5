//! Password hashing and bearer tokens.

use crate::error::AppError;
use crate::user::Role;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

static ARGON2: Lazy<Argon2<'static>> = Lazy::new(Argon2::default);

pub fn get_argon2() -> &'static Argon2<'static> {
    &ARGON2
}

/// Hashes a plain text password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    get_argon2()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Server(format!("Password hashing failed: {}", e)))
}

/// Checks a plain text password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => get_argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }
}

/// Signing and verification keys for bearer tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Builds keys from configuration. An empty secret is replaced with a
    /// random one, which invalidates every token on restart.
    pub fn from_config(config: &crate::app_config::AuthConfig) -> Self {
        if config.jwt_secret.len() >= 32 {
            return Self::new(config.jwt_secret.as_bytes(), config.token_ttl_hours);
        }

        let random_string: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        log::warn!("auth.jwt_secret is missing or shorter than 32 bytes. Issued tokens will not survive a restart.");
        Self::new(random_string.as_bytes(), config.token_ttl_hours)
    }

    /// Issues a token for a user.
    pub fn issue(&self, user_id: i32, role: Role) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Server(format!("Token encoding failed: {}", e)))
    }

    /// Validates signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("hunter22!").unwrap();
        assert!(verify_password("hunter22!", &hash));
        assert!(!verify_password("hunter23!", &hash));
    }

    #[test]
    fn test_malformed_hash_rejects() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_token_carries_user_and_role() {
        let keys = TokenKeys::new(b"0123456789abcdef0123456789abcdef", 1);
        let token = keys.issue(42, Role::Company).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.role, "company");
    }

    #[test]
    fn test_token_signed_with_other_secret_fails() {
        let keys = TokenKeys::new(b"0123456789abcdef0123456789abcdef", 1);
        let other = TokenKeys::new(b"fedcba9876543210fedcba9876543210", 1);
        let token = other.issue(1, Role::Student).unwrap();
        assert!(matches!(keys.verify(&token), Err(AppError::Authentication(_))));
    }

    #[test]
    fn test_expired_token_fails() {
        // Beyond the default 60 second leeway.
        let keys = TokenKeys::new(b"0123456789abcdef0123456789abcdef", -1);
        let token = keys.issue(1, Role::Admin).unwrap();
        assert!(keys.verify(&token).is_err());
    }
}
