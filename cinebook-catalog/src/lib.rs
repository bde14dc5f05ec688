pub mod movie;
pub mod coupon;
pub mod pricing;

pub use movie::{Movie, Show};
pub use coupon::{Coupon, CouponError};
pub use pricing::{evaluate, PricingError, Quote};
