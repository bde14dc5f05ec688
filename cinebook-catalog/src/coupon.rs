use serde::{Deserialize, Serialize};

/// Longest coupon code accepted at the boundary.
pub const MAX_CODE_LEN: usize = 32;

/// A per-user discount rule with a usage limit.
///
/// Codes compare case-insensitively. Once `usage_count` reaches `max_usage_count` the
/// coupon is dropped from the user's active set rather than kept around as spent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coupon {
    pub code: String,
    /// Whole percent, 0..=100
    pub discount_percent: i32,
    /// Absolute cap on the discount, minor units
    pub max_discount_amount: i64,
    /// Smallest pre-discount total that qualifies, minor units
    pub min_total_amount: i64,
    pub usage_count: i32,
    pub max_usage_count: i32,
}

impl Coupon {
    pub fn new(
        code: &str,
        discount_percent: i32,
        max_discount_amount: i64,
        min_total_amount: i64,
        max_usage_count: i32,
    ) -> Result<Self, CouponError> {
        let coupon = Self {
            code: validate_code(code)?.to_string(),
            discount_percent,
            max_discount_amount,
            min_total_amount,
            usage_count: 0,
            max_usage_count,
        };
        coupon.validate()?;
        Ok(coupon)
    }

    /// Checks the definition invariants.
    pub fn validate(&self) -> Result<(), CouponError> {
        if !(0..=100).contains(&self.discount_percent) {
            return Err(CouponError::InvalidDefinition(format!(
                "discount percent {} outside 0..=100",
                self.discount_percent
            )));
        }
        if self.max_discount_amount <= 0 {
            return Err(CouponError::InvalidDefinition(
                "max discount amount must be positive".to_string(),
            ));
        }
        if self.min_total_amount < 0 {
            return Err(CouponError::InvalidDefinition(
                "min total amount must not be negative".to_string(),
            ));
        }
        if self.max_usage_count <= 0 {
            return Err(CouponError::InvalidDefinition(
                "max usage count must be positive".to_string(),
            ));
        }
        if self.usage_count < 0 || self.usage_count > self.max_usage_count {
            return Err(CouponError::InvalidDefinition(format!(
                "usage count {} outside 0..={}",
                self.usage_count, self.max_usage_count
            )));
        }
        Ok(())
    }

    pub fn matches(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code)
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_count >= self.max_usage_count
    }

    pub fn remaining_uses(&self) -> i32 {
        (self.max_usage_count - self.usage_count).max(0)
    }

    /// True when one more use retires the coupon.
    pub fn is_last_use(&self) -> bool {
        self.usage_count + 1 >= self.max_usage_count
    }
}

/// Lookup key for a code: codes are ASCII, so lowercasing is enough.
pub fn code_key(code: &str) -> String {
    code.to_ascii_lowercase()
}

/// Accepts 1..=32 ASCII alphanumerics, after trimming surrounding whitespace.
pub fn validate_code(code: &str) -> Result<&str, CouponError> {
    let trimmed = code.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAX_CODE_LEN
        || !trimmed.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(CouponError::InvalidCode(code.to_string()));
    }
    Ok(trimmed)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CouponError {
    #[error("Malformed coupon code: {0:?}")]
    InvalidCode(String),

    #[error("Invalid coupon definition: {0}")]
    InvalidDefinition(String),
}
