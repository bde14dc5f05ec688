pub mod booking;
pub mod user;
pub mod repository;
pub mod identity;

use cinebook_catalog::{CouponError, PricingError};
use repository::StoreError;

/// Every way a booking can fail, as seen by callers of the booking core.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Requested number of seats is not available: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("Minimum total amount of {min_total} required to apply this coupon")]
    CouponNotEligible { total: i64, min_total: i64 },

    #[error("Coupon code {0} has reached its maximum usage limit")]
    CouponExhausted(String),

    #[error("Concurrent update conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// The caller may retry the same intent later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::ConcurrencyConflict(_) | BookingError::StorageUnavailable(_)
        )
    }

    /// Expected rejections: reported to the caller, not logged as failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BookingError::NotFound(_)
                | BookingError::InvalidRequest(_)
                | BookingError::InsufficientSeats { .. }
                | BookingError::CouponNotEligible { .. }
                | BookingError::CouponExhausted(_)
                | BookingError::Unauthorized(_)
        )
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => BookingError::StorageUnavailable(msg),
            StoreError::Duplicate(msg) => BookingError::Internal(format!("duplicate record: {}", msg)),
            StoreError::Backend(msg) => BookingError::Internal(msg),
        }
    }
}

impl From<PricingError> for BookingError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::CouponNotEligible { total, min_total } => {
                BookingError::CouponNotEligible { total, min_total }
            }
            PricingError::AmountOverflow => BookingError::InvalidRequest(err.to_string()),
        }
    }
}

impl From<CouponError> for BookingError {
    fn from(err: CouponError) -> Self {
        BookingError::InvalidRequest(err.to_string())
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
