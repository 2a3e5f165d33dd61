pub mod password;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use password::{Argon2Hasher, PasswordError, PasswordHasher};

/// Closed set of account roles. Serialized lowercase in tokens and rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Seller,
    Customer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Seller, Role::Customer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Seller => "seller",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    // Exact match only: "Customer" is not a role.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "seller" => Ok(Role::Seller),
            "customer" => Ok(Role::Customer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The authenticated caller, reconstructed from a verified token on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub email: String,
    pub user_id: i64,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub user_id: i64,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            email: claims.email,
            user_id: claims.user_id,
            role: claims.role,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed token")]
    Malformed,

    #[error("Token signature does not match")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Signing key is empty")]
    InvalidSecret,
}

/// Issues and validates HS256 identity tokens.
///
/// Built once at startup from the configured key and shared by handle; the
/// key never changes for the lifetime of the process.
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::InvalidSecret);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        })
    }

    pub fn issue(&self, user_id: i64, email: &str, role: Role) -> Result<String, AuthError> {
        self.issue_at(user_id, email, role, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let exp = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Signing(format!("expiry out of range: {} + {}", now, self.ttl)))?;

        let claims = Claims {
            email: email.to_string(),
            user_id,
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies signature and shape, then rejects any instant at or past `exp`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, AuthError> {
        // Expiry is checked below against `now` so the boundary is exact (no leeway).
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => AuthError::BadSignature,
            _ => AuthError::Malformed,
        })?;

        if now.timestamp() >= token_data.claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(token_data.claims.into())
    }
}
