mod pool;

pub use pool::PoolStore;

use async_trait::async_trait;
use ulid::Ulid;

use crate::limits::MAX_CITY_NAME_LEN;
use crate::model::{PoolSummary, SeatId, SeatRecord};

#[derive(Debug)]
pub enum StoreError {
    PoolNotFound(String),
    PoolExists(String),
    InvalidCity(&'static str),
    LimitExceeded(&'static str),
    Wal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::PoolNotFound(city) => write!(f, "pool not found: {city}"),
            StoreError::PoolExists(city) => write!(f, "pool already exists: {city}"),
            StoreError::InvalidCity(msg) => write!(f, "invalid city: {msg}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Lowercase and strip a raw city name down to a filename/key-safe form.
/// City keys are case-insensitive; the filter prevents path traversal when
/// names end up in on-disk artifacts.
pub fn normalize_city(raw: &str) -> Result<String, StoreError> {
    if raw.len() > MAX_CITY_NAME_LEN {
        return Err(StoreError::LimitExceeded("city name too long"));
    }
    let safe: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if safe.is_empty() {
        return Err(StoreError::InvalidCity("empty city name"));
    }
    Ok(safe)
}

/// The storage contract the allocation core depends on. Implementations must
/// make `conditional_book` atomic per call: all covered seats transition as
/// one indivisible operation relative to other `conditional_book` calls, and
/// the returned count is what actually changed. That conditional write is the
/// correctness mechanism for at-most-once booking — not any lock the callers
/// hold.
#[async_trait]
pub trait SeatStore: Send + Sync {
    /// Snapshot read of every record in one city pool. No ordering guarantee;
    /// callers sort.
    async fn list_seats(&self, city: &str) -> Result<Vec<SeatRecord>, StoreError>;

    /// Set BOOKED on every seat in `[id_min, id_max]` that is currently
    /// AVAILABLE, atomically, and return how many seats changed. Zero is a
    /// normal outcome (already booked, or no such ids). `booking_ref` is
    /// recorded with the transition for audit.
    async fn conditional_book(
        &self,
        city: &str,
        id_min: SeatId,
        id_max: SeatId,
        booking_ref: Ulid,
    ) -> Result<u64, StoreError>;

    /// Create a city pool with the given seats, all AVAILABLE.
    /// Returns the normalized city name.
    async fn create_pool(&self, city: &str, id_nos: &[SeatId]) -> Result<String, StoreError>;

    /// Add seats to an existing pool; ids already present are skipped.
    /// Returns how many were added.
    async fn add_seats(&self, city: &str, id_nos: &[SeatId]) -> Result<u64, StoreError>;

    /// Occupancy counts for every pool, ascending by city.
    async fn pool_summaries(&self) -> Result<Vec<PoolSummary>, StoreError>;
}
