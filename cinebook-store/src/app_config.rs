use serde::Deserialize;
use std::env;
use cinebook_catalog::{Coupon, CouponError};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingRules,
    pub signup_coupon: SignupCoupon,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Unset means the in-memory store
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

// Same as bcrypt::DEFAULT_COST
fn default_bcrypt_cost() -> u32 { 12 }

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_jitter_ms: u64,
    pub rate_limit_per_minute: i64,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 10,
            backoff_jitter_ms: 15,
            rate_limit_per_minute: 100,
        }
    }
}

/// The coupon every new account starts with.
#[derive(Debug, Deserialize, Clone)]
pub struct SignupCoupon {
    pub code: String,
    pub discount_percent: i32,
    pub max_discount_amount: i64,
    pub min_total_amount: i64,
    pub max_usage_count: i32,
}

impl SignupCoupon {
    pub fn to_coupon(&self) -> Result<Coupon, CouponError> {
        Coupon::new(
            &self.code,
            self.discount_percent,
            self.max_discount_amount,
            self.min_total_amount,
            self.max_usage_count,
        )
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CINEBOOK__AUTH__JWT_SECRET=...`
            .add_source(config::Environment::with_prefix("CINEBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
