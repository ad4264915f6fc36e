//! Access token claims and request context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Build the per-request context handed to every engine call
    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.user_id, self.role, Utc::now())
    }
}

/// Who is acting and when.
///
/// Passed explicitly into every engine call so that no operation reads a
/// wall clock or a shared session on its own.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub actor_id: i32,
    pub role: Role,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(actor_id: i32, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            actor_id,
            role,
            now,
        }
    }
}
