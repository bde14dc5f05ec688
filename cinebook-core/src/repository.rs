use async_trait::async_trait;
use uuid::Uuid;
use cinebook_catalog::{Coupon, Movie, Show};
use crate::user::{BookingRequest, NewUser, User};

/// Failures reported by storage adapters.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable or timed out; the operation did not happen.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a conditional coupon redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponUpdate {
    /// Usage incremented, coupon still active.
    Applied { usage_count: i32 },
    /// Usage reached the maximum and the coupon was removed in the same update.
    Retired,
    /// The usage count moved since it was read, or the coupon is gone.
    Conflict,
}

/// Repository trait for movies and the per-show seat counters
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_movie(&self, movie_id: Uuid) -> StoreResult<Option<Movie>>;

    async fn get_show(&self, movie_id: Uuid, show_id: i32) -> StoreResult<Option<Show>>;

    /// Sets the show's available seats to `new` only if they currently equal `expected`.
    /// Returns whether the update was applied.
    async fn compare_and_set_seats(
        &self,
        movie_id: Uuid,
        show_id: i32,
        expected: i32,
        new: i32,
    ) -> StoreResult<bool>;

    /// Atomically gives `seats` back, refusing to exceed capacity.
    /// Returns whether the seats were released.
    async fn release_seats(&self, movie_id: Uuid, show_id: i32, seats: i32) -> StoreResult<bool>;
}

/// Repository trait for users and their coupon sets
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the username is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Case-insensitive lookup in the user's active set.
    async fn find_coupon(&self, user_id: Uuid, code: &str) -> StoreResult<Option<Coupon>>;

    /// Consumes one use if the coupon's usage count still equals `expected_usage`,
    /// deleting the coupon in the same update when that use exhausts it.
    async fn redeem_coupon(
        &self,
        user_id: Uuid,
        code: &str,
        expected_usage: i32,
    ) -> StoreResult<CouponUpdate>;

    /// Gives one use back: decrements the usage count, or re-inserts the coupon with a
    /// single use left if it was retired in the meantime.
    async fn restore_coupon(&self, user_id: Uuid, coupon: &Coupon) -> StoreResult<()>;
}

/// Append-only booking history
#[async_trait]
pub trait BookingLog: Send + Sync {
    async fn append(&self, user_id: Uuid, booking: &BookingRequest) -> StoreResult<()>;

    /// Bookings of a user in append order.
    async fn list(&self, user_id: Uuid) -> StoreResult<Vec<BookingRequest>>;
}

/// System-wide monotonic counter backing reference numbers
#[async_trait]
pub trait ReferenceSequence: Send + Sync {
    async fn next_value(&self) -> StoreResult<u64>;
}
