use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// A single scheduled screening with its own price and seat inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Show {
    /// Unique within the owning movie
    pub id: i32,
    pub show_timing: DateTime<Utc>,
    /// Price per seat in minor currency units
    pub unit_price: i64,
    pub capacity: i32,
    /// Only ever changed through the seat allocator
    pub available_seats: i32,
}

impl Show {
    pub fn new(id: i32, show_timing: DateTime<Utc>, unit_price: i64, capacity: i32) -> Self {
        Self {
            id,
            show_timing,
            unit_price,
            capacity,
            available_seats: capacity,
        }
    }

    pub fn has_seats(&self, requested: i32) -> bool {
        requested <= self.available_seats
    }

    /// Seats already sold, derived from capacity.
    pub fn sold_seats(&self) -> i32 {
        self.capacity - self.available_seats
    }

    /// Pre-discount total for `seats` seats, `None` on overflow.
    pub fn total_for(&self, seats: i32) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(seats))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub shows: Vec<Show>,
}

impl Movie {
    pub fn new(title: impl Into<String>, shows: Vec<Show>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            shows,
        }
    }

    pub fn find_show(&self, show_id: i32) -> Option<&Show> {
        self.shows.iter().find(|s| s.id == show_id)
    }
}
