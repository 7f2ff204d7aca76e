use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use ulid::Ulid;

use crate::allocator::Allocator;
use crate::error::AllocationError;
use crate::finder::find_runs;
use crate::limits::*;
use crate::model::{
    BookingOutcome, CandidateRange, PLACEHOLDER_ID, PoolSummary, SeatId, SeatStatus,
};
use crate::store::{SeatStore, normalize_city};

/// Default number of candidate ranges returned per city.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Candidates for one requested city. `ranges` may be empty — that city has
/// no available block of the requested length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCandidates {
    pub city: String,
    pub ranges: Vec<CandidateRange>,
}

/// Aggregate result of one book request: per-range outcomes plus the total
/// number of seats that actually transitioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReport {
    pub total_modified: u64,
    pub all_committed: bool,
    pub outcomes: Vec<BookingOutcome>,
}

/// The facade callers go through: find candidate blocks, commit a selection,
/// administer pools. Holds the store behind the narrow SeatStore contract —
/// every find and every commit reads/writes through, nothing is cached
/// across requests.
pub struct AllocationService {
    store: Arc<dyn SeatStore>,
    allocator: Allocator,
}

impl AllocationService {
    pub fn new(store: Arc<dyn SeatStore>) -> Self {
        let allocator = Allocator::new(store.clone());
        Self { store, allocator }
    }

    /// Find up to `max_results` disjoint contiguous blocks of `block_length`
    /// available ids per requested city, in request order.
    ///
    /// A city with no stored pool fails with NotFound. If every city yields
    /// zero candidates the whole call is NoCandidates; otherwise per-city
    /// empty lists are preserved so mixed results stay visible.
    pub async fn find(
        &self,
        cities: &[String],
        block_length: u64,
        max_results: usize,
    ) -> Result<Vec<CityCandidates>, AllocationError> {
        if cities.is_empty() {
            return Err(AllocationError::InvalidArgument("empty city list"));
        }
        if block_length == 0 {
            return Err(AllocationError::InvalidArgument(
                "block length must be positive",
            ));
        }
        if block_length > MAX_BLOCK_LENGTH {
            return Err(AllocationError::LimitExceeded("block length too large"));
        }
        if max_results == 0 {
            return Err(AllocationError::InvalidArgument(
                "max results must be positive",
            ));
        }
        if max_results > MAX_RESULTS {
            return Err(AllocationError::LimitExceeded("too many results requested"));
        }

        let mut results = Vec::with_capacity(cities.len());
        for city in cities {
            // Normalize once: the response echoes the exact key the store
            // filed the pool under.
            let city = normalize_city(city)?;
            let records = self.store.list_seats(&city).await?;
            // Read snapshot: AVAILABLE records only, placeholder slot excluded.
            let available: Vec<SeatId> = records
                .iter()
                .filter(|r| r.status == SeatStatus::Available && r.id_no > PLACEHOLDER_ID)
                .map(|r| r.id_no)
                .collect();

            let ranges = find_runs(&available, block_length, max_results)
                .into_iter()
                .map(|(start, end)| CandidateRange::new(city.clone(), start, end))
                .collect();
            results.push(CityCandidates { city, ranges });
        }

        if results.iter().all(|c| c.ranges.is_empty()) {
            return Err(AllocationError::NoCandidates);
        }
        Ok(results)
    }

    /// Commit a selection of ranges. Each range is re-checked against live
    /// state by the store's conditional transition; outcomes are aggregated
    /// and the call fails with NothingBooked only when zero seats
    /// transitioned across all ranges.
    pub async fn book(&self, ranges: &[CandidateRange]) -> Result<BookReport, AllocationError> {
        if ranges.is_empty() {
            return Err(AllocationError::InvalidArgument("no ranges to book"));
        }
        if ranges.len() > MAX_BOOK_RANGES {
            return Err(AllocationError::LimitExceeded("too many ranges in one request"));
        }
        for range in ranges {
            if range.start > range.end {
                return Err(AllocationError::InvalidArgument("range start exceeds end"));
            }
            if range.len() > MAX_BLOCK_LENGTH {
                return Err(AllocationError::LimitExceeded("range too large"));
            }
        }

        let outcomes = self.allocator.commit_many(ranges).await?;
        let total_modified: u64 = outcomes.iter().map(|o| o.modified_count).sum();
        if total_modified == 0 {
            return Err(AllocationError::NothingBooked);
        }

        let all_committed = outcomes.iter().all(|o| o.committed);
        info!(total_modified, all_committed, "booking applied");
        Ok(BookReport {
            total_modified,
            all_committed,
            outcomes,
        })
    }

    /// Create a city pool seeded with the given card numbers, all AVAILABLE.
    pub async fn create_pool(
        &self,
        city: &str,
        id_nos: &[SeatId],
    ) -> Result<String, AllocationError> {
        let city = self.store.create_pool(city, id_nos).await?;
        info!(%city, seats = id_nos.len(), "pool created");
        Ok(city)
    }

    /// Extend an existing pool. Returns how many seats were actually added.
    pub async fn add_seats(&self, city: &str, id_nos: &[SeatId]) -> Result<u64, AllocationError> {
        let added = self.store.add_seats(city, id_nos).await?;
        info!(%city, added, "seats added");
        Ok(added)
    }

    /// Maintenance bulk-mark: book every id in `[start, end]` for one city.
    /// Same conditional primitive as a normal commit — already-booked ids
    /// contribute zero — so it stays safe even if run concurrently, though it
    /// is intended for single-writer seeding/migration.
    pub async fn seed_booked(
        &self,
        city: &str,
        start: SeatId,
        end: SeatId,
    ) -> Result<u64, AllocationError> {
        if start > end {
            return Err(AllocationError::InvalidArgument("range start exceeds end"));
        }
        let modified = self
            .store
            .conditional_book(city, start, end, Ulid::new())
            .await?;
        info!(%city, start, end, modified, "range marked as booked");
        Ok(modified)
    }

    pub async fn list_pools(&self) -> Result<Vec<PoolSummary>, AllocationError> {
        Ok(self.store.pool_summaries().await?)
    }
}
