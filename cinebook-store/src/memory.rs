use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;
use tracing::debug;
use chrono::{Duration, Utc};
use cinebook_catalog::{Coupon, Movie, Show};
use cinebook_core::repository::{
    BookingLog, CatalogStore, CouponUpdate, StoreError, StoreResult, UserStore,
};
use cinebook_core::user::{BookingRequest, NewUser, User};

#[derive(Default)]
struct State {
    movies: HashMap<Uuid, Movie>,
    users: HashMap<Uuid, User>,
    bookings: HashMap<Uuid, Vec<BookingRequest>>,
    references: HashSet<String>,
}

/// In-process store used when no database is configured, and by tests.
///
/// Every conditional write runs under the write lock, so the compare and the set
/// are a single step just like the SQL statements they stand in for.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    fail_appends: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with the given movies in the catalog.
    pub fn with_movies(movies: Vec<Movie>) -> Self {
        Self {
            state: RwLock::new(State {
                movies: movies.into_iter().map(|m| (m.id, m)).collect(),
                ..State::default()
            }),
            fail_appends: AtomicBool::new(false),
        }
    }

    pub async fn insert_movie(&self, movie: Movie) {
        self.state.write().await.movies.insert(movie.id, movie);
    }

    /// While set, booking appends fail as if the backend were unreachable.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

/// The catalog the seed migration installs, with screenings over the next two days.
pub fn sample_movies() -> Vec<Movie> {
    let now = Utc::now();
    vec![
        Movie {
            id: Uuid::from_u128(0x6f1c2a8e_3b7d_4c1a_9e55_0a4d1b2c3d01),
            title: "Interstellar".to_string(),
            shows: vec![
                Show::new(1, now + Duration::hours(24), 25_000, 120),
                Show::new(2, now + Duration::hours(27), 30_000, 120),
            ],
        },
        Movie {
            id: Uuid::from_u128(0x6f1c2a8e_3b7d_4c1a_9e55_0a4d1b2c3d02),
            title: "The Dark Knight".to_string(),
            shows: vec![Show::new(1, now + Duration::hours(48), 22_000, 80)],
        },
    ]
}

fn show_mut<'a>(state: &'a mut State, movie_id: Uuid, show_id: i32) -> Option<&'a mut Show> {
    state
        .movies
        .get_mut(&movie_id)
        .and_then(|movie| movie.shows.iter_mut().find(|show| show.id == show_id))
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_movie(&self, movie_id: Uuid) -> StoreResult<Option<Movie>> {
        Ok(self.state.read().await.movies.get(&movie_id).cloned())
    }

    async fn get_show(&self, movie_id: Uuid, show_id: i32) -> StoreResult<Option<Show>> {
        let state = self.state.read().await;
        Ok(state
            .movies
            .get(&movie_id)
            .and_then(|movie| movie.find_show(show_id))
            .cloned())
    }

    async fn compare_and_set_seats(
        &self,
        movie_id: Uuid,
        show_id: i32,
        expected: i32,
        new: i32,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(show) = show_mut(&mut state, movie_id, show_id) else {
            return Ok(false);
        };
        if show.available_seats != expected || new < 0 || new > show.capacity {
            return Ok(false);
        }
        show.available_seats = new;
        Ok(true)
    }

    async fn release_seats(&self, movie_id: Uuid, show_id: i32, seats: i32) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(show) = show_mut(&mut state, movie_id, show_id) else {
            return Ok(false);
        };
        match show.available_seats.checked_add(seats) {
            Some(after) if seats > 0 && after <= show.capacity => {
                show.available_seats = after;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate(format!("username {}", user.username)));
        }
        let user = user.into_user();
        state.users.insert(user.id, user.clone());
        debug!(user_id = %user.id, "user created");
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_coupon(&self, user_id: Uuid, code: &str) -> StoreResult<Option<Coupon>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .get(&user_id)
            .and_then(|user| user.coupon(code))
            .cloned())
    }

    async fn redeem_coupon(
        &self,
        user_id: Uuid,
        code: &str,
        expected_usage: i32,
    ) -> StoreResult<CouponUpdate> {
        let mut state = self.state.write().await;
        let Some(user) = state.users.get_mut(&user_id) else {
            return Ok(CouponUpdate::Conflict);
        };
        let Some(index) = user.coupons.iter().position(|c| c.matches(code)) else {
            return Ok(CouponUpdate::Conflict);
        };

        let coupon = &mut user.coupons[index];
        if coupon.usage_count != expected_usage {
            return Ok(CouponUpdate::Conflict);
        }
        if coupon.is_last_use() {
            user.coupons.remove(index);
            return Ok(CouponUpdate::Retired);
        }
        coupon.usage_count += 1;
        Ok(CouponUpdate::Applied { usage_count: coupon.usage_count })
    }

    async fn restore_coupon(&self, user_id: Uuid, coupon: &Coupon) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::Backend(format!("user {} not found", user_id)))?;

        match user.coupons.iter_mut().find(|c| c.matches(&coupon.code)) {
            Some(active) => active.usage_count = (active.usage_count - 1).max(0),
            None => {
                let mut restored = coupon.clone();
                restored.usage_count = coupon.max_usage_count - 1;
                user.coupons.push(restored);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BookingLog for MemoryStore {
    async fn append(&self, user_id: Uuid, booking: &BookingRequest) -> StoreResult<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("booking log offline".to_string()));
        }
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::Backend(format!("user {} not found", user_id)));
        }
        if !state.references.insert(booking.reference_number.clone()) {
            return Err(StoreError::Duplicate(format!(
                "reference number {}",
                booking.reference_number
            )));
        }
        state.bookings.entry(user_id).or_default().push(booking.clone());
        Ok(())
    }

    async fn list(&self, user_id: Uuid) -> StoreResult<Vec<BookingRequest>> {
        Ok(self
            .state
            .read()
            .await
            .bookings
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
