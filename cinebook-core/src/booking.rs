use serde::{Deserialize, Serialize};
use uuid::Uuid;
use cinebook_catalog::{coupon, Movie, Show};
use crate::user::BookingRequest;
use crate::{BookingError, BookingResult};

/// What a customer asks for. Built from a request body once the caller is identified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingIntent {
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub show_id: i32,
    pub seats: i32,
    pub coupon_code: Option<String>,
}

impl BookingIntent {
    /// Boundary checks that need no storage. Returns the cleaned coupon code.
    pub fn validate(&self) -> BookingResult<Option<String>> {
        if self.seats <= 0 {
            return Err(BookingError::InvalidRequest(format!(
                "seat count must be positive, got {}",
                self.seats
            )));
        }

        match self.coupon_code.as_deref() {
            None => Ok(None),
            Some(code) => Ok(Some(coupon::validate_code(code)?.to_string())),
        }
    }
}

/// Returned to the customer after a committed booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingReceipt {
    pub reference_number: String,
    pub movie_title: String,
    pub show_timing: String,
    pub price_before_coupon: i64,
    pub discount_amount: i64,
    pub price_after_coupon: i64,
    pub final_amount: i64,
}

impl BookingReceipt {
    pub fn new(booking: &BookingRequest, movie: &Movie, show: &Show) -> Self {
        Self {
            reference_number: booking.reference_number.clone(),
            movie_title: movie.title.clone(),
            show_timing: show.show_timing.to_rfc3339(),
            price_before_coupon: booking.price_before_coupon,
            discount_amount: booking.discount_amount,
            price_after_coupon: booking.final_amount,
            final_amount: booking.final_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(seats: i32, coupon_code: Option<&str>) -> BookingIntent {
        BookingIntent {
            user_id: Uuid::new_v4(),
            movie_id: Uuid::new_v4(),
            show_id: 1,
            seats,
            coupon_code: coupon_code.map(str::to_string),
        }
    }

    #[test]
    fn test_rejects_non_positive_seats() {
        assert!(matches!(intent(0, None).validate(), Err(BookingError::InvalidRequest(_))));
        assert!(matches!(intent(-2, None).validate(), Err(BookingError::InvalidRequest(_))));
        assert_eq!(intent(2, None).validate(), Ok(None));
    }

    #[test]
    fn test_cleans_coupon_code() {
        assert_eq!(intent(2, Some(" new20 ")).validate(), Ok(Some("new20".to_string())));
        assert!(matches!(
            intent(2, Some("new 20")).validate(),
            Err(BookingError::InvalidRequest(_))
        ));
    }
}
