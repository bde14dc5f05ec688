use std::sync::Arc;
use std::time::Duration;
use cinebook_booking::{BookingOrchestrator, RetryPolicy};
use cinebook_catalog::Coupon;
use cinebook_core::identity::IdentityProvider;
use cinebook_core::repository::{BookingLog, CatalogStore, ReferenceSequence, UserStore};
use cinebook_store::app_config::{BookingRules, Config};
use cinebook_booking::AtomicSequence;
use cinebook_store::{DbClient, MemoryStore, PgReferenceSequence, RedisClient};
use crate::identity::JwtIdentityProvider;

/// Storage backends the service runs on.
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub users: Arc<dyn UserStore>,
    pub log: Arc<dyn BookingLog>,
    pub sequence: Arc<dyn ReferenceSequence>,
}

impl Stores {
    /// Everything in one [`MemoryStore`].
    pub fn in_memory(store: Arc<MemoryStore>, sequence: Arc<dyn ReferenceSequence>) -> Self {
        Self {
            catalog: store.clone(),
            users: store.clone(),
            log: store,
            sequence,
        }
    }
}

/// Where reference numbers come from: Redis when configured, otherwise the database
/// sequence. The process-local counter only backs a purely in-memory deployment.
pub fn reference_sequence(
    db: Option<&DbClient>,
    redis: Option<&Arc<RedisClient>>,
) -> Arc<dyn ReferenceSequence> {
    match (redis, db) {
        (Some(redis), _) => redis.clone() as Arc<dyn ReferenceSequence>,
        (None, Some(db)) => Arc::new(PgReferenceSequence::new(db.pool.clone())),
        (None, None) => Arc::new(AtomicSequence::new()),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub bookings: Arc<BookingOrchestrator>,
    pub tokens: Arc<JwtIdentityProvider>,
    pub identity: Arc<dyn IdentityProvider>,
    pub redis: Option<Arc<RedisClient>>,
    pub rules: BookingRules,
    pub signup_coupon: Coupon,
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(stores: Stores, redis: Option<Arc<RedisClient>>, config: &Config) -> anyhow::Result<Self> {
        let rules = config.booking.clone();
        let retry = RetryPolicy::new(
            rules.max_attempts,
            Duration::from_millis(rules.backoff_base_ms),
            Duration::from_millis(rules.backoff_jitter_ms),
        );
        let bookings = BookingOrchestrator::new(
            stores.catalog,
            stores.users.clone(),
            stores.log,
            stores.sequence,
            retry,
        );
        let tokens = Arc::new(JwtIdentityProvider::new(
            &config.auth.jwt_secret,
            config.auth.jwt_expiration_seconds,
        ));

        Ok(Self {
            users: stores.users,
            bookings: Arc::new(bookings),
            identity: tokens.clone(),
            tokens,
            redis,
            rules,
            signup_coupon: config.signup_coupon.to_coupon()?,
            bcrypt_cost: config.auth.bcrypt_cost,
        })
    }
}
