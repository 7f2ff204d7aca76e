use std::sync::Arc;

use tracing::debug;
use ulid::Ulid;

use crate::error::AllocationError;
use crate::model::{BookingOutcome, CandidateRange};
use crate::store::SeatStore;

/// Commits candidate ranges against the store's conditional transition.
///
/// The at-most-once-per-id guarantee comes entirely from the store contract:
/// the transition only flips seats that are AVAILABLE at the instant it runs,
/// so a range raced by another commit comes back with a short count instead
/// of a double grant. No in-process lock is assumed — multiple allocator
/// instances over one store stay correct.
pub struct Allocator {
    store: Arc<dyn SeatStore>,
}

impl Allocator {
    pub fn new(store: Arc<dyn SeatStore>) -> Self {
        Self { store }
    }

    /// Attempt to book every id in `range`. `committed` is true iff the full
    /// range transitioned; a zero or short `modified_count` means a racing
    /// commit (or an earlier identical one — retries are safe) got there
    /// first, which is an expected outcome, not an error.
    pub async fn commit(&self, range: &CandidateRange) -> Result<BookingOutcome, AllocationError> {
        if range.start > range.end {
            return Err(AllocationError::InvalidArgument("range start exceeds end"));
        }

        let booking_ref = Ulid::new();
        let modified = self
            .store
            .conditional_book(&range.city, range.start, range.end, booking_ref)
            .await?;

        let committed = modified == range.len();
        if committed {
            metrics::counter!(crate::observability::BOOKINGS_COMMITTED_TOTAL).increment(1);
        } else {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            debug!(
                city = %range.city,
                start = range.start,
                end = range.end,
                modified,
                "partial or stale commit"
            );
        }

        Ok(BookingOutcome {
            committed,
            modified_count: modified,
            booking_ref: committed.then_some(booking_ref),
        })
    }

    /// Commit each range in order, collecting per-range outcomes. A failed
    /// range does not stop later ones; partial success stays visible.
    pub async fn commit_many(
        &self,
        ranges: &[CandidateRange],
    ) -> Result<Vec<BookingOutcome>, AllocationError> {
        let mut outcomes = Vec::with_capacity(ranges.len());
        for range in ranges {
            outcomes.push(self.commit(range).await?);
        }
        Ok(outcomes)
    }
}
