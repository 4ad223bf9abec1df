//! Access token claim decoding and session derivation
//!
//! The client has no signing key, so signatures are NOT verified here;
//! the server remains the authority. Structure and expiry ARE validated,
//! which is what the `authenticated` invariant depends on.

use crate::error::ClientError;
use crate::storage::TokenPair;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims this client expects inside an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// User role; absent means a plain user
    #[serde(default)]
    pub role: Option<Role>,

    /// Optional email claim
    #[serde(default)]
    pub email: Option<String>,

    /// Expiration (unix seconds)
    pub exp: i64,

    /// Issued at (unix seconds)
    #[serde(default)]
    pub iat: i64,
}

/// User role carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Derived in-memory notion of "who is logged in"
/// Recomputed from stored tokens, never trusted as independent state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub email: Option<String>,
}

impl Session {
    /// Derive a session from a stored token pair
    ///
    /// Pure function of the pair: deriving twice from the same pair yields
    /// the same session (modulo the expiry clock).
    pub fn from_pair(pair: &TokenPair) -> Result<Self, ClientError> {
        let claims = decode_claims(&pair.access_token)?;
        Ok(Session {
            user_id: claims.sub,
            role: claims.role.unwrap_or(Role::User),
            email: claims.email,
        })
    }
}

/// Decode access token claims without verifying the signature
/// Expired or structurally invalid tokens are rejected
pub fn decode_claims(token: &str) -> Result<Claims, ClientError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "access token claim decoding failed");
            ClientError::Decode(e.to_string())
        })
}
