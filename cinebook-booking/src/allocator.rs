use std::sync::Arc;
use uuid::Uuid;
use tracing::{debug, error, info, warn};
use cinebook_core::repository::CatalogStore;
use cinebook_core::{BookingError, BookingResult};
use crate::retry::RetryPolicy;

/// Seats taken from a show's counter, kept so they can be given back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub movie_id: Uuid,
    pub show_id: i32,
    pub seats: i32,
    /// Available seats observed by the winning compare-and-set
    pub remaining_before: i32,
}

impl Reservation {
    pub fn remaining_after(&self) -> i32 {
        self.remaining_before - self.seats
    }
}

/// Reserves seats with optimistic concurrency against the stored seat counter.
pub struct SeatAllocator {
    catalog: Arc<dyn CatalogStore>,
    retry: RetryPolicy,
}

impl SeatAllocator {
    pub fn new(catalog: Arc<dyn CatalogStore>, retry: RetryPolicy) -> Self {
        Self { catalog, retry }
    }

    /// Read, check, compare-and-set; a lost race starts over until the retry budget is
    /// spent.
    pub async fn reserve(&self, movie_id: Uuid, show_id: i32, seats: i32) -> BookingResult<Reservation> {
        if seats <= 0 {
            return Err(BookingError::InvalidRequest(format!(
                "seat count must be positive, got {}",
                seats
            )));
        }

        for attempt in 1..=self.retry.max_attempts {
            let show = self
                .catalog
                .get_show(movie_id, show_id)
                .await?
                .ok_or_else(|| BookingError::NotFound(format!("show {} of movie {}", show_id, movie_id)))?;

            let available = show.available_seats;
            if seats > available {
                return Err(BookingError::InsufficientSeats {
                    requested: seats,
                    available,
                });
            }

            if self
                .catalog
                .compare_and_set_seats(movie_id, show_id, available, available - seats)
                .await?
            {
                debug!(%movie_id, show_id, seats, remaining = available - seats, "seats reserved");
                return Ok(Reservation {
                    movie_id,
                    show_id,
                    seats,
                    remaining_before: available,
                });
            }

            debug!(%movie_id, show_id, attempt, "lost seat counter race");
            if attempt < self.retry.max_attempts {
                self.retry.pause(attempt).await;
            }
        }

        warn!(%movie_id, show_id, seats, attempts = self.retry.max_attempts, "seat reservation retries exhausted");
        Err(BookingError::ConcurrencyConflict(format!(
            "seat counter of show {} kept changing",
            show_id
        )))
    }

    /// Compensation: puts the reserved seats back on the counter.
    pub async fn release(&self, reservation: &Reservation) -> BookingResult<()> {
        let released = self
            .catalog
            .release_seats(reservation.movie_id, reservation.show_id, reservation.seats)
            .await?;

        if !released {
            error!(
                movie_id = %reservation.movie_id,
                show_id = reservation.show_id,
                seats = reservation.seats,
                "seat release rejected, counter would exceed capacity"
            );
            return Err(BookingError::Internal(format!(
                "could not release {} seats of show {}",
                reservation.seats, reservation.show_id
            )));
        }

        info!(
            movie_id = %reservation.movie_id,
            show_id = reservation.show_id,
            seats = reservation.seats,
            "reservation released"
        );
        Ok(())
    }
}
