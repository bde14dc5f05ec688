use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use cinebook_catalog::Coupon;
use cinebook_shared::Masked;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A registered customer and their active coupons.
///
/// Booking history is kept separately in the [`crate::repository::BookingLog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Masked<String>,
    pub first_name: String,
    pub last_name: String,
    pub contact: Option<String>,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: Masked<String>,
    pub coupons: Vec<Coupon>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Active coupon by case-insensitive code.
    pub fn coupon(&self, code: &str) -> Option<&Coupon> {
        self.coupons.iter().find(|c| c.matches(code))
    }
}

/// Sign-up payload, already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Masked<String>,
    pub first_name: String,
    pub last_name: String,
    pub contact: Option<String>,
    pub role: Role,
    pub password_hash: Masked<String>,
    pub coupons: Vec<Coupon>,
}

impl NewUser {
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            contact: self.contact,
            role: self.role,
            password_hash: self.password_hash,
            coupons: self.coupons,
            created_at: Utc::now(),
        }
    }
}

/// Immutable record of a completed booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingRequest {
    pub reference_number: String,
    pub movie_id: Uuid,
    pub show_id: i32,
    pub seats: i32,
    /// Seat price at the time of booking
    pub unit_price: i64,
    pub price_before_coupon: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
}
