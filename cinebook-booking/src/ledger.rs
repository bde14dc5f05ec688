use std::sync::Arc;
use uuid::Uuid;
use tracing::{debug, info, warn};
use cinebook_catalog::{pricing, Coupon};
use cinebook_core::repository::{CouponUpdate, UserStore};
use cinebook_core::{BookingError, BookingResult};
use crate::retry::RetryPolicy;

/// One consumed coupon use, with the definition needed to hand it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub user_id: Uuid,
    /// Coupon as read right before the winning update
    pub coupon: Coupon,
    /// The use exhausted the coupon and it left the active set
    pub retired: bool,
}

/// Per-user coupon usage, updated with conditional writes only.
pub struct CouponLedger {
    users: Arc<dyn UserStore>,
    retry: RetryPolicy,
}

impl CouponLedger {
    pub fn new(users: Arc<dyn UserStore>, retry: RetryPolicy) -> Self {
        Self { users, retry }
    }

    /// Active coupon by case-insensitive code.
    pub async fn lookup(&self, user_id: Uuid, code: &str) -> BookingResult<Coupon> {
        self.users
            .find_coupon(user_id, code)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("coupon code {} for the user", code)))
    }

    /// Consumes one use of `code` for a booking priced at `priced_total`.
    ///
    /// The increment and, on the last use, the removal happen in a single store update
    /// conditioned on the usage count read here.
    pub async fn redeem(&self, user_id: Uuid, code: &str, priced_total: i64) -> BookingResult<Redemption> {
        for attempt in 1..=self.retry.max_attempts {
            let coupon = self.lookup(user_id, code).await?;
            if coupon.is_exhausted() {
                return Err(BookingError::CouponExhausted(coupon.code));
            }
            pricing::check_eligible(priced_total, &coupon)?;

            match self
                .users
                .redeem_coupon(user_id, &coupon.code, coupon.usage_count)
                .await?
            {
                CouponUpdate::Applied { usage_count } => {
                    debug!(%user_id, code = %coupon.code, usage_count, "coupon use recorded");
                    return Ok(Redemption { user_id, coupon, retired: false });
                }
                CouponUpdate::Retired => {
                    info!(%user_id, code = %coupon.code, "coupon reached its usage limit and was retired");
                    return Ok(Redemption { user_id, coupon, retired: true });
                }
                CouponUpdate::Conflict => {
                    debug!(%user_id, code = %coupon.code, attempt, "lost coupon usage race");
                    if attempt < self.retry.max_attempts {
                        self.retry.pause(attempt).await;
                    }
                }
            }
        }

        warn!(%user_id, code, attempts = self.retry.max_attempts, "coupon redemption retries exhausted");
        Err(BookingError::ConcurrencyConflict(format!(
            "usage of coupon {} kept changing",
            code
        )))
    }

    /// Compensation: gives the consumed use back.
    pub async fn restore(&self, redemption: &Redemption) -> BookingResult<()> {
        self.users
            .restore_coupon(redemption.user_id, &redemption.coupon)
            .await?;
        info!(
            user_id = %redemption.user_id,
            code = %redemption.coupon.code,
            retired = redemption.retired,
            "coupon use restored"
        );
        Ok(())
    }
}
