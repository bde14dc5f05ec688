use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;
use crate::{BookingError, BookingResult};

/// Resolves an opaque session credential to the user it was issued for.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, credential: &str) -> BookingResult<Uuid>;
}

/// Fixed credential table, for tests and local tooling.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityProvider {
    sessions: HashMap<String, Uuid>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, credential: impl Into<String>, user_id: Uuid) -> Self {
        self.sessions.insert(credential.into(), user_id);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, credential: &str) -> BookingResult<Uuid> {
        self.sessions
            .get(credential)
            .copied()
            .ok_or_else(|| BookingError::Unauthorized("unknown session".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let user_id = Uuid::new_v4();
        let provider = StaticIdentityProvider::new().with_session("token-1", user_id);

        assert_eq!(provider.resolve("token-1").await, Ok(user_id));
        assert!(matches!(
            provider.resolve("token-2").await,
            Err(BookingError::Unauthorized(_))
        ));
    }
}
