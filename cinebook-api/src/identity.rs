use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use cinebook_core::identity::IdentityProvider;
use cinebook_core::user::Role;
use cinebook_core::{BookingError, BookingResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// HS256 session tokens. The secret comes from configuration at startup.
pub struct JwtIdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiration_seconds: u64,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str, expiration_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiration_seconds,
        }
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_owned(),
            exp: (Utc::now() + Duration::seconds(self.expiration_seconds as i64)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn resolve(&self, credential: &str) -> BookingResult<Uuid> {
        let token = decode::<Claims>(credential, &self.decoding, &Validation::default())
            .map_err(|e| BookingError::Unauthorized(format!("invalid token: {}", e)))?;

        Uuid::parse_str(&token.claims.sub)
            .map_err(|_| BookingError::Unauthorized("malformed subject".to_string()))
    }
}
