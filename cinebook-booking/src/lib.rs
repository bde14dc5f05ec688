pub mod retry;
pub mod allocator;
pub mod ledger;
pub mod reference;
pub mod stage;
pub mod orchestrator;

pub use retry::RetryPolicy;
pub use allocator::{Reservation, SeatAllocator};
pub use ledger::{CouponLedger, Redemption};
pub use reference::{AtomicSequence, ReferenceGenerator};
pub use stage::{BookingStage, StageError};
pub use orchestrator::BookingOrchestrator;

#[cfg(test)]
pub(crate) mod fixtures;
