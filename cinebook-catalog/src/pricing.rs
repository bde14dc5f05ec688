use serde::{Deserialize, Serialize};
use crate::coupon::Coupon;
use crate::movie::Show;

/// Priced booking: what the customer pays and why.
///
/// All amounts are integer minor units, so the same inputs always give the same quote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub price_before_coupon: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
}

impl Quote {
    /// Quote without a coupon.
    pub fn undiscounted(total_amount: i64) -> Self {
        Self {
            price_before_coupon: total_amount,
            discount_amount: 0,
            final_amount: total_amount,
        }
    }
}

/// Applies `coupon` to `total_amount`.
///
/// `discount = min(total * percent / 100, cap)`, with the division truncating.
/// Fails when the total is below the coupon's qualifying minimum.
pub fn evaluate(total_amount: i64, coupon: &Coupon) -> Result<Quote, PricingError> {
    check_eligible(total_amount, coupon)?;

    let raw_discount = total_amount
        .checked_mul(i64::from(coupon.discount_percent))
        .ok_or(PricingError::AmountOverflow)?
        / 100;
    let discount_amount = raw_discount.min(coupon.max_discount_amount);

    Ok(Quote {
        price_before_coupon: total_amount,
        discount_amount,
        final_amount: total_amount - discount_amount,
    })
}

pub fn check_eligible(total_amount: i64, coupon: &Coupon) -> Result<(), PricingError> {
    if total_amount < coupon.min_total_amount {
        return Err(PricingError::CouponNotEligible {
            total: total_amount,
            min_total: coupon.min_total_amount,
        });
    }
    Ok(())
}

/// Prices `seats` seats of `show`, applying `coupon` when given.
pub fn quote(show: &Show, seats: i32, coupon: Option<&Coupon>) -> Result<Quote, PricingError> {
    let total = show.total_for(seats).ok_or(PricingError::AmountOverflow)?;
    match coupon {
        Some(coupon) => evaluate(total, coupon),
        None => Ok(Quote::undiscounted(total)),
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Minimum total amount of {min_total} required to apply this coupon (total {total})")]
    CouponNotEligible { total: i64, min_total: i64 },

    #[error("Booking total overflows")]
    AmountOverflow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn new20() -> Coupon {
        Coupon::new("NEW20", 20, 149, 499, 2).unwrap()
    }

    #[test]
    fn test_percentage_discount() {
        let quote = evaluate(500, &new20()).unwrap();
        assert_eq!(quote.discount_amount, 100);
        assert_eq!(quote.final_amount, 400);
        assert_eq!(quote.price_before_coupon, 500);
    }

    #[test]
    fn test_below_minimum_is_not_eligible() {
        let err = evaluate(400, &new20()).unwrap_err();
        assert_eq!(err, PricingError::CouponNotEligible { total: 400, min_total: 499 });
    }

    #[test]
    fn test_discount_is_capped() {
        let quote = evaluate(1000, &new20()).unwrap();
        assert_eq!(quote.discount_amount, 149);
        assert_eq!(quote.final_amount, 851);
    }

    #[test]
    fn test_minor_units_scale() {
        let coupon = Coupon::new("NEW20", 20, 14_900, 49_900, 2).unwrap();
        let quote = evaluate(50_000, &coupon).unwrap();
        assert_eq!(quote.discount_amount, 10_000);
        assert_eq!(quote.final_amount, 40_000);
    }

    #[test]
    fn test_quote_for_show() {
        let show = Show::new(1, Utc::now(), 250, 40);

        let plain = quote(&show, 3, None).unwrap();
        assert_eq!(plain, Quote::undiscounted(750));

        let discounted = quote(&show, 4, Some(&new20())).unwrap();
        assert_eq!(discounted.price_before_coupon, 1000);
        assert_eq!(discounted.final_amount, 851);

        let expensive = Show::new(2, Utc::now(), i64::MAX / 2, 40);
        assert_eq!(quote(&expensive, 3, None), Err(PricingError::AmountOverflow));
    }

    proptest! {
        #[test]
        fn prop_discount_bounds(
            total in 0i64..10_000_000,
            percent in 0i32..=100,
            cap in 1i64..1_000_000,
            min_total in 0i64..10_000_000,
        ) {
            let coupon = Coupon::new("PROP", percent, cap, min_total, 1).unwrap();
            match evaluate(total, &coupon) {
                Ok(q) => {
                    prop_assert!(total >= min_total);
                    prop_assert!(q.discount_amount <= cap);
                    prop_assert!(q.discount_amount <= total);
                    prop_assert!(q.discount_amount >= 0);
                    prop_assert_eq!(q.final_amount + q.discount_amount, total);
                    prop_assert_eq!(evaluate(total, &coupon).unwrap(), q);
                }
                Err(e) => {
                    prop_assert!(total < min_total);
                    prop_assert_eq!(e, PricingError::CouponNotEligible { total, min_total });
                }
            }
        }
    }
}
