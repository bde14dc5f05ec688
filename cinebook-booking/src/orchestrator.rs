use std::sync::Arc;
use chrono::Utc;
use uuid::Uuid;
use tracing::{debug, error, info, instrument, warn};
use cinebook_catalog::pricing;
use cinebook_core::booking::{BookingIntent, BookingReceipt};
use cinebook_core::repository::{BookingLog, CatalogStore, ReferenceSequence, UserStore};
use cinebook_core::user::BookingRequest;
use cinebook_core::{BookingError, BookingResult};
use crate::allocator::{Reservation, SeatAllocator};
use crate::ledger::{CouponLedger, Redemption};
use crate::reference::ReferenceGenerator;
use crate::retry::RetryPolicy;
use crate::stage::BookingStage;

/// Mutations applied so far by one booking, in the order they must be undone.
struct Transaction {
    stage: BookingStage,
    reservation: Option<Reservation>,
    redemption: Option<Redemption>,
}

impl Transaction {
    fn new() -> Self {
        Self {
            stage: BookingStage::Validating,
            reservation: None,
            redemption: None,
        }
    }

    fn advance(&mut self, next: BookingStage) -> BookingResult<()> {
        self.stage
            .advance(next)
            .map_err(|e| BookingError::Internal(e.to_string()))
    }
}

/// Runs a booking as one logical transaction: reserve seats, price, redeem the coupon,
/// append the record. Whatever fails after the reservation is compensated before the
/// error reaches the caller.
pub struct BookingOrchestrator {
    catalog: Arc<dyn CatalogStore>,
    users: Arc<dyn UserStore>,
    log: Arc<dyn BookingLog>,
    allocator: SeatAllocator,
    ledger: CouponLedger,
    references: ReferenceGenerator,
}

impl BookingOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        users: Arc<dyn UserStore>,
        log: Arc<dyn BookingLog>,
        sequence: Arc<dyn ReferenceSequence>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            allocator: SeatAllocator::new(catalog.clone(), retry),
            ledger: CouponLedger::new(users.clone(), retry),
            references: ReferenceGenerator::new(sequence),
            catalog,
            users,
            log,
        }
    }

    #[instrument(
        skip(self, intent),
        fields(
            user_id = %intent.user_id,
            movie_id = %intent.movie_id,
            show_id = intent.show_id,
            seats = intent.seats
        )
    )]
    pub async fn book(&self, intent: &BookingIntent) -> BookingResult<BookingReceipt> {
        let mut tx = Transaction::new();
        match self.run(&mut tx, intent).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => Err(self.abort(&mut tx, err).await),
        }
    }

    /// Booking history of a user, oldest first.
    pub async fn history(&self, user_id: Uuid) -> BookingResult<Vec<BookingRequest>> {
        Ok(self.log.list(user_id).await?)
    }

    async fn run(&self, tx: &mut Transaction, intent: &BookingIntent) -> BookingResult<BookingReceipt> {
        // Validating: nothing may be mutated before the reservation.
        let code = intent.validate()?;

        let user = self
            .users
            .get_user(intent.user_id)
            .await?
            .ok_or_else(|| BookingError::NotFound("user".to_string()))?;
        let movie = self
            .catalog
            .get_movie(intent.movie_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("movie {}", intent.movie_id)))?;
        let show = movie
            .find_show(intent.show_id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("show {}", intent.show_id)))?;

        // Snapshot check only; the allocator re-checks atomically.
        if !show.has_seats(intent.seats) {
            return Err(BookingError::InsufficientSeats {
                requested: intent.seats,
                available: show.available_seats,
            });
        }

        if let Some(code) = code.as_deref() {
            let coupon = user
                .coupon(code)
                .ok_or_else(|| BookingError::NotFound(format!("coupon code {} for the user", code)))?;
            if coupon.is_exhausted() {
                return Err(BookingError::CouponExhausted(coupon.code.clone()));
            }
        }

        let reservation = self.allocator.reserve(movie.id, show.id, intent.seats).await?;
        tx.reservation = Some(reservation);
        tx.advance(BookingStage::SeatsReserved)?;

        let coupon = match code.as_deref() {
            Some(code) => Some(self.ledger.lookup(user.id, code).await?),
            None => None,
        };
        let quote = pricing::quote(&show, intent.seats, coupon.as_ref())?;
        tx.advance(BookingStage::Priced)?;

        let mut coupon_code = None;
        if let Some(coupon) = coupon {
            let redemption = self
                .ledger
                .redeem(user.id, &coupon.code, quote.price_before_coupon)
                .await?;
            coupon_code = Some(redemption.coupon.code.clone());
            tx.redemption = Some(redemption);
            tx.advance(BookingStage::CouponApplied)?;
        }

        let booking = BookingRequest {
            reference_number: self.references.next().await?,
            movie_id: movie.id,
            show_id: show.id,
            seats: intent.seats,
            unit_price: show.unit_price,
            price_before_coupon: quote.price_before_coupon,
            discount_amount: quote.discount_amount,
            final_amount: quote.final_amount,
            coupon_code,
            created_at: Utc::now(),
        };
        self.log.append(user.id, &booking).await?;
        tx.advance(BookingStage::Committed)?;

        info!(
            reference_number = %booking.reference_number,
            final_amount = booking.final_amount,
            remaining = reservation.remaining_after(),
            "booking committed"
        );
        Ok(BookingReceipt::new(&booking, &movie, &show))
    }

    /// Undoes the coupon use and the reservation, newest first, then reports `err`.
    /// A failed compensation replaces `err` with an internal error.
    async fn abort(&self, tx: &mut Transaction, err: BookingError) -> BookingError {
        let stage = tx.stage;
        if stage.is_terminal() {
            error!(?stage, error = %err, "booking failed after it was committed");
            return err;
        }

        let mut failure = err;

        if let Some(redemption) = tx.redemption.take() {
            if let Err(e) = self.ledger.restore(&redemption).await {
                error!(
                    user_id = %redemption.user_id,
                    code = %redemption.coupon.code,
                    cause = %failure,
                    error = %e,
                    "coupon compensation failed"
                );
                failure = BookingError::Internal(format!("coupon compensation failed: {}", e));
            }
        }

        if let Some(reservation) = tx.reservation.take() {
            if let Err(e) = self.allocator.release(&reservation).await {
                error!(
                    movie_id = %reservation.movie_id,
                    show_id = reservation.show_id,
                    seats = reservation.seats,
                    cause = %failure,
                    error = %e,
                    "seat compensation failed"
                );
                failure = BookingError::Internal(format!("seat compensation failed: {}", e));
            }
        }

        tx.stage = BookingStage::Aborted;

        if failure.is_rejection() {
            debug!(?stage, error = %failure, "booking rejected");
        } else if failure.is_retryable() {
            warn!(?stage, error = %failure, "booking failed, caller may retry");
        } else {
            error!(?stage, error = %failure, "booking failed");
        }
        failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cinebook_catalog::Coupon;
    use cinebook_core::repository::{CouponUpdate, StoreResult};
    use cinebook_core::user::{NewUser, User};
    use cinebook_store::MemoryStore;
    use crate::fixtures::{new20, seed_movie, seed_user, show_seats, SHOW_ID};
    use crate::reference::AtomicSequence;

    fn orchestrator(store: &Arc<MemoryStore>, retry: RetryPolicy) -> BookingOrchestrator {
        BookingOrchestrator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(AtomicSequence::new()),
            retry,
        )
    }

    fn intent(user_id: Uuid, movie_id: Uuid, seats: i32, coupon_code: Option<&str>) -> BookingIntent {
        BookingIntent {
            user_id,
            movie_id,
            show_id: SHOW_ID,
            seats,
            coupon_code: coupon_code.map(str::to_string),
        }
    }

    /// Loses every coupon redemption race, as when other bookings keep using the coupon
    /// between pricing and redemption.
    struct RacingUsers {
        inner: Arc<MemoryStore>,
        /// Let the competing booking actually take the use; otherwise only report the loss.
        consume: bool,
    }

    #[async_trait]
    impl UserStore for RacingUsers {
        async fn create_user(&self, user: NewUser) -> StoreResult<User> {
            self.inner.create_user(user).await
        }

        async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
            self.inner.get_user(user_id).await
        }

        async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
            self.inner.find_user_by_username(username).await
        }

        async fn find_coupon(&self, user_id: Uuid, code: &str) -> StoreResult<Option<Coupon>> {
            self.inner.find_coupon(user_id, code).await
        }

        async fn redeem_coupon(&self, user_id: Uuid, code: &str, expected_usage: i32) -> StoreResult<CouponUpdate> {
            if self.consume {
                self.inner.redeem_coupon(user_id, code, expected_usage).await?;
            }
            Ok(CouponUpdate::Conflict)
        }

        async fn restore_coupon(&self, user_id: Uuid, coupon: &Coupon) -> StoreResult<()> {
            self.inner.restore_coupon(user_id, coupon).await
        }
    }

    #[tokio::test]
    async fn test_booking_without_coupon() {
        let store = Arc::new(MemoryStore::new());
        let movie_id = seed_movie(&store, 40, 25_000).await;
        let user_id = seed_user(&store, vec![new20()]).await;
        let orchestrator = orchestrator(&store, RetryPolicy::immediate(3));

        let receipt = orchestrator.book(&intent(user_id, movie_id, 3, None)).await.unwrap();

        assert_eq!(receipt.movie_title, "Interstellar");
        assert_eq!(receipt.price_before_coupon, 75_000);
        assert_eq!(receipt.discount_amount, 0);
        assert_eq!(receipt.final_amount, 75_000);
        assert_eq!(receipt.reference_number.len(), 16);
        assert_eq!(show_seats(&store, movie_id).await, 37);

        let history = orchestrator.history(user_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reference_number, receipt.reference_number);
        assert_eq!(history[0].unit_price, 25_000);
        assert_eq!(history[0].coupon_code, None);

        // Coupon untouched
        assert_eq!(store.find_coupon(user_id, "NEW20").await.unwrap().unwrap().usage_count, 0);
    }

    #[tokio::test]
    async fn test_booking_with_coupon_until_retired() {
        let store = Arc::new(MemoryStore::new());
        let movie_id = seed_movie(&store, 40, 25_000).await;
        let user_id = seed_user(&store, vec![new20()]).await;
        let orchestrator = orchestrator(&store, RetryPolicy::immediate(3));

        let first = orchestrator
            .book(&intent(user_id, movie_id, 2, Some("new20")))
            .await
            .unwrap();
        assert_eq!(first.price_before_coupon, 50_000);
        assert_eq!(first.discount_amount, 10_000);
        assert_eq!(first.price_after_coupon, 40_000);
        assert_eq!(first.final_amount, 40_000);

        // Capped at 149.00
        let second = orchestrator
            .book(&intent(user_id, movie_id, 4, Some("NEW20")))
            .await
            .unwrap();
        assert_eq!(second.discount_amount, 14_900);
        assert_eq!(second.final_amount, 85_100);
        assert!(store.find_coupon(user_id, "NEW20").await.unwrap().is_none());

        let err = orchestrator
            .book(&intent(user_id, movie_id, 2, Some("NEW20")))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
        assert_eq!(show_seats(&store, movie_id).await, 34);

        let history = orchestrator.history(user_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].coupon_code.as_deref(), Some("NEW20"));
        assert_ne!(history[0].reference_number, history[1].reference_number);
    }

    #[tokio::test]
    async fn test_ineligible_coupon_releases_seats() {
        let store = Arc::new(MemoryStore::new());
        let movie_id = seed_movie(&store, 40, 25_000).await;
        let user_id = seed_user(&store, vec![new20()]).await;
        let orchestrator = orchestrator(&store, RetryPolicy::immediate(3));

        let err = orchestrator
            .book(&intent(user_id, movie_id, 1, Some("NEW20")))
            .await
            .unwrap_err();

        assert_eq!(err, BookingError::CouponNotEligible { total: 25_000, min_total: 49_900 });
        assert_eq!(show_seats(&store, movie_id).await, 40);
        assert_eq!(store.find_coupon(user_id, "NEW20").await.unwrap().unwrap().usage_count, 0);
        assert!(orchestrator.history(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let movie_id = seed_movie(&store, 40, 25_000).await;
        let user_id = seed_user(&store, vec![new20()]).await;
        let orchestrator = orchestrator(&store, RetryPolicy::immediate(3));

        for bad in [
            intent(user_id, movie_id, 0, Some("NEW20")),
            intent(user_id, movie_id, -1, None),
            intent(user_id, movie_id, 2, Some("NEW 20")),
        ] {
            assert!(matches!(orchestrator.book(&bad).await, Err(BookingError::InvalidRequest(_))));
        }

        assert_eq!(show_seats(&store, movie_id).await, 40);
        assert_eq!(store.find_coupon(user_id, "NEW20").await.unwrap().unwrap().usage_count, 0);
        assert!(orchestrator.history(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_references() {
        let store = Arc::new(MemoryStore::new());
        let movie_id = seed_movie(&store, 40, 25_000).await;
        let user_id = seed_user(&store, vec![]).await;
        let orchestrator = orchestrator(&store, RetryPolicy::immediate(3));

        let cases = [
            intent(Uuid::new_v4(), movie_id, 1, None),
            intent(user_id, Uuid::new_v4(), 1, None),
            BookingIntent { show_id: 7, ..intent(user_id, movie_id, 1, None) },
            intent(user_id, movie_id, 2, Some("NEW20")),
        ];
        for case in cases {
            assert!(matches!(orchestrator.book(&case).await, Err(BookingError::NotFound(_))));
        }
        assert_eq!(show_seats(&store, movie_id).await, 40);
    }

    #[tokio::test]
    async fn test_more_seats_than_available() {
        let store = Arc::new(MemoryStore::new());
        let movie_id = seed_movie(&store, 5, 25_000).await;
        let user_id = seed_user(&store, vec![]).await;
        let orchestrator = orchestrator(&store, RetryPolicy::immediate(3));

        let err = orchestrator.book(&intent(user_id, movie_id, 6, None)).await.unwrap_err();
        assert_eq!(err, BookingError::InsufficientSeats { requested: 6, available: 5 });
        assert_eq!(show_seats(&store, movie_id).await, 5);
    }

    #[tokio::test]
    async fn test_lost_coupon_race_releases_seats() {
        let store = Arc::new(MemoryStore::new());
        let movie_id = seed_movie(&store, 40, 25_000).await;
        let user_id = seed_user(&store, vec![new20()]).await;
        let orchestrator = BookingOrchestrator::new(
            store.clone(),
            Arc::new(RacingUsers { inner: store.clone(), consume: true }),
            store.clone(),
            Arc::new(AtomicSequence::new()),
            RetryPolicy::immediate(3),
        );

        let err = orchestrator
            .book(&intent(user_id, movie_id, 2, Some("NEW20")))
            .await
            .unwrap_err();

        // The competing bookings used the coupon up.
        assert!(matches!(err, BookingError::NotFound(_)));
        assert_eq!(show_seats(&store, movie_id).await, 40);
        assert!(orchestrator.history(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_coupon_contention_conflict_releases_seats() {
        let store = Arc::new(MemoryStore::new());
        let movie_id = seed_movie(&store, 40, 25_000).await;
        let user_id = seed_user(&store, vec![new20()]).await;
        let orchestrator = BookingOrchestrator::new(
            store.clone(),
            Arc::new(RacingUsers { inner: store.clone(), consume: false }),
            store.clone(),
            Arc::new(AtomicSequence::new()),
            RetryPolicy::immediate(3),
        );

        let err = orchestrator
            .book(&intent(user_id, movie_id, 2, Some("NEW20")))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::ConcurrencyConflict(_)));
        assert!(err.is_retryable());
        assert_eq!(show_seats(&store, movie_id).await, 40);
        assert_eq!(store.find_coupon(user_id, "NEW20").await.unwrap().unwrap().usage_count, 0);
        assert!(orchestrator.history(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_failure_compensates_everything() {
        let store = Arc::new(MemoryStore::new());
        let movie_id = seed_movie(&store, 40, 25_000).await;
        let user_id = seed_user(&store, vec![new20()]).await;
        let orchestrator = orchestrator(&store, RetryPolicy::immediate(3));

        // Take the coupon to its last use so the failed booking retires it.
        orchestrator
            .book(&intent(user_id, movie_id, 2, Some("NEW20")))
            .await
            .unwrap();
        store.fail_appends(true);

        let err = orchestrator
            .book(&intent(user_id, movie_id, 2, Some("NEW20")))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::StorageUnavailable(_)));
        assert!(err.is_retryable());

        assert_eq!(show_seats(&store, movie_id).await, 38);
        let coupon = store.find_coupon(user_id, "NEW20").await.unwrap().unwrap();
        assert_eq!(coupon.usage_count, 1);
        assert_eq!(orchestrator.history(user_id).await.unwrap().len(), 1);

        store.fail_appends(false);
        orchestrator
            .book(&intent(user_id, movie_id, 2, Some("NEW20")))
            .await
            .unwrap();
        assert!(store.find_coupon(user_id, "NEW20").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_bookings_never_overbook() {
        let capacity = 12;
        let store = Arc::new(MemoryStore::new());
        let movie_id = seed_movie(&store, capacity, 25_000).await;
        let orchestrator = Arc::new(orchestrator(&store, RetryPolicy::immediate(capacity as u32 + 1)));

        let mut users = Vec::new();
        for _ in 0..30 {
            users.push(seed_user(&store, vec![]).await);
        }

        let handles: Vec<_> = users
            .iter()
            .map(|&user_id| {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move { orchestrator.book(&intent(user_id, movie_id, 1, None)).await })
            })
            .collect();

        let mut confirmed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => confirmed += 1,
                Err(e) => assert!(matches!(e, BookingError::InsufficientSeats { .. }), "{:?}", e),
            }
        }

        assert_eq!(confirmed, capacity);
        assert_eq!(show_seats(&store, movie_id).await, 0);

        let mut booked = 0;
        for user_id in users {
            booked += orchestrator
                .history(user_id)
                .await
                .unwrap()
                .iter()
                .map(|b| b.seats)
                .sum::<i32>();
        }
        assert_eq!(booked, capacity);
    }
}
