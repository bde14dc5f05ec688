use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use cinebook_core::repository::{ReferenceSequence, StoreResult};
use cinebook_core::BookingResult;

/// Issues booking reference numbers: a zero-padded sequence value followed by a
/// four-digit random suffix. Uniqueness comes from the sequence alone.
pub struct ReferenceGenerator {
    sequence: Arc<dyn ReferenceSequence>,
}

impl ReferenceGenerator {
    pub fn new(sequence: Arc<dyn ReferenceSequence>) -> Self {
        Self { sequence }
    }

    pub async fn next(&self) -> BookingResult<String> {
        let value = self.sequence.next_value().await?;
        Ok(format_reference(value, random_suffix()))
    }
}

fn random_suffix() -> u32 {
    rand::thread_rng().gen_range(0..10_000)
}

fn format_reference(value: u64, suffix: u32) -> String {
    format!("{:012}{:04}", value, suffix)
}

/// In-process sequence. Only unique within one process; multi-instance deployments use
/// the Redis-backed sequence instead.
#[derive(Debug, Default)]
pub struct AtomicSequence {
    counter: AtomicU64,
}

impl AtomicSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(value: u64) -> Self {
        Self {
            counter: AtomicU64::new(value),
        }
    }
}

#[async_trait]
impl ReferenceSequence for AtomicSequence {
    async fn next_value(&self) -> StoreResult<u64> {
        Ok(self.counter.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
