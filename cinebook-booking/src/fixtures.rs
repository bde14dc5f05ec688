use chrono::{Duration, Utc};
use uuid::Uuid;
use cinebook_catalog::{Coupon, Movie, Show};
use cinebook_core::repository::{CatalogStore, UserStore};
use cinebook_core::user::{NewUser, Role};
use cinebook_store::MemoryStore;

pub const SHOW_ID: i32 = 1;

/// The sign-up coupon: 20% off, capped at 149.00, on totals of at least 499.00, twice.
pub fn new20() -> Coupon {
    Coupon::new("NEW20", 20, 14_900, 49_900, 2).unwrap()
}

pub async fn seed_movie(store: &MemoryStore, capacity: i32, unit_price: i64) -> Uuid {
    let movie = Movie::new(
        "Interstellar",
        vec![Show::new(SHOW_ID, Utc::now() + Duration::days(1), unit_price, capacity)],
    );
    let movie_id = movie.id;
    store.insert_movie(movie).await;
    movie_id
}

pub async fn seed_user(store: &MemoryStore, coupons: Vec<Coupon>) -> Uuid {
    let username = format!("user{}", Uuid::new_v4().simple());
    let user = store
        .create_user(NewUser {
            username,
            email: "jane@example.com".to_string().into(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            contact: None,
            role: Role::User,
            password_hash: "not-a-real-hash".to_string().into(),
            coupons,
        })
        .await
        .unwrap();
    user.id
}

pub async fn show_seats(store: &MemoryStore, movie_id: Uuid) -> i32 {
    store
        .get_show(movie_id, SHOW_ID)
        .await
        .unwrap()
        .unwrap()
        .available_seats
}
