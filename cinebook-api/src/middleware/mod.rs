pub mod auth;
pub mod rate_limit;

pub use auth::{customer_auth_middleware, CurrentUser};
pub use rate_limit::rate_limit_middleware;
