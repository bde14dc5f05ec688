pub mod app_config;
pub mod database;
pub mod catalog_repo;
pub mod user_repo;
pub mod booking_repo;
pub mod redis_repo;
pub mod memory;

pub use app_config::Config;
pub use database::DbClient;
pub use catalog_repo::PgCatalogStore;
pub use user_repo::PgUserStore;
pub use booking_repo::{PgBookingLog, PgReferenceSequence};
pub use redis_repo::RedisClient;
pub use memory::{sample_movies, MemoryStore};
