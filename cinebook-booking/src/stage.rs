/// Where a booking transaction stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStage {
    Validating,
    SeatsReserved,
    Priced,
    CouponApplied,
    Committed,
    Aborted,
}

impl BookingStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStage::Committed | BookingStage::Aborted)
    }

    pub fn can_transition_to(self, next: BookingStage) -> bool {
        use BookingStage::*;
        match (self, next) {
            (Validating, SeatsReserved)
            | (SeatsReserved, Priced)
            | (Priced, CouponApplied)
            | (Priced, Committed)
            | (CouponApplied, Committed) => true,
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Moves to `next`, rejecting anything the state machine does not allow.
    pub fn advance(&mut self, next: BookingStage) -> Result<(), StageError> {
        if !self.can_transition_to(next) {
            return Err(StageError::InvalidTransition { from: *self, to: next });
        }
        *self = next;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StageError {
    #[error("Invalid booking stage transition from {from:?} to {to:?}")]
    InvalidTransition { from: BookingStage, to: BookingStage },
}
