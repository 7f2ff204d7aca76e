use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Physical card number — the only id type. Unique within a city.
pub type SeatId = i64;

/// Card numbers at or below this value are placeholder slots, never allocated.
pub const PLACEHOLDER_ID: SeatId = 0;

/// The full lifecycle of a seat: one transition, no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Booked,
}

/// One card record as seen through the store contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRecord {
    pub id_no: SeatId,
    pub status: SeatStatus,
}

/// In-memory state of one city pool. Seats are keyed by card number so range
/// scans for the conditional transition are ordered walks, not full sweeps.
#[derive(Debug, Clone)]
pub struct PoolState {
    pub city: String,
    pub seats: BTreeMap<SeatId, SeatStatus>,
}

impl PoolState {
    pub fn new(city: String) -> Self {
        Self {
            city,
            seats: BTreeMap::new(),
        }
    }

    /// Add a seat as AVAILABLE. Returns false if the card number already exists.
    pub fn insert_seat(&mut self, id_no: SeatId) -> bool {
        if self.seats.contains_key(&id_no) {
            return false;
        }
        self.seats.insert(id_no, SeatStatus::Available);
        true
    }

    /// Snapshot of all records, ascending by card number.
    pub fn records(&self) -> Vec<SeatRecord> {
        self.seats
            .iter()
            .map(|(&id_no, &status)| SeatRecord { id_no, status })
            .collect()
    }

    /// Count of seats in `[start, end]` that would flip if booked now.
    pub fn bookable_in_range(&self, start: SeatId, end: SeatId) -> u64 {
        self.seats
            .range(start..=end)
            .filter(|&(_, &s)| s == SeatStatus::Available)
            .count() as u64
    }

    /// The conditional transition: AVAILABLE→BOOKED for every seat in
    /// `[start, end]`. Already-booked seats are untouched. Returns the number
    /// of seats actually flipped.
    pub fn book_range(&mut self, start: SeatId, end: SeatId) -> u64 {
        let mut modified = 0u64;
        for (_, status) in self.seats.range_mut(start..=end) {
            if *status == SeatStatus::Available {
                *status = SeatStatus::Booked;
                modified += 1;
            }
        }
        modified
    }

    /// Booked seats grouped into maximal consecutive runs. Used by WAL
    /// compaction to re-express booked state as a few RangeBooked events.
    pub fn booked_runs(&self) -> Vec<(SeatId, SeatId)> {
        let mut runs: Vec<(SeatId, SeatId)> = Vec::new();
        for (&id_no, &status) in &self.seats {
            if status != SeatStatus::Booked {
                continue;
            }
            match runs.last_mut() {
                Some((_, end)) if id_no == *end + 1 => *end = id_no,
                _ => runs.push((id_no, id_no)),
            }
        }
        runs
    }

    pub fn summary(&self) -> PoolSummary {
        let booked = self
            .seats
            .values()
            .filter(|&&s| s == SeatStatus::Booked)
            .count() as u64;
        let total = self.seats.len() as u64;
        PoolSummary {
            city: self.city.clone(),
            total,
            available: total - booked,
            booked,
        }
    }
}

/// A contiguous run of currently-available card numbers proposed to a caller.
/// Contiguity is by construction: the range covers every id in `[start, end]`.
/// Ephemeral — produced by a find, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRange {
    pub city: String,
    pub start: SeatId,
    pub end: SeatId,
}

impl CandidateRange {
    pub fn new(city: impl Into<String>, start: SeatId, end: SeatId) -> Self {
        debug_assert!(start <= end, "range start must not exceed end");
        Self {
            city: city.into(),
            start,
            end,
        }
    }

    /// Number of card ids covered. Saturates at `u64::MAX` for bounds that
    /// span (nearly) the whole id space, so callers comparing against a
    /// length cap reject such ranges instead of wrapping past them.
    pub fn len(&self) -> u64 {
        self.end.abs_diff(self.start).saturating_add(1)
    }
}

/// Result of one commit attempt. `modified_count < len` means a racing commit
/// got there first for some ids — expected under contention, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingOutcome {
    pub committed: bool,
    pub modified_count: u64,
    /// Set only when the full range was committed.
    pub booking_ref: Option<Ulid>,
}

/// Per-pool occupancy counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub city: String,
    pub total: u64,
    pub available: u64,
    pub booked: u64,
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    PoolCreated {
        city: String,
        id_nos: Vec<SeatId>,
    },
    SeatsAdded {
        city: String,
        id_nos: Vec<SeatId>,
    },
    RangeBooked {
        booking_ref: Ulid,
        city: String,
        start: SeatId,
        end: SeatId,
    },
}

impl Event {
    pub fn city(&self) -> &str {
        match self {
            Event::PoolCreated { city, .. }
            | Event::SeatsAdded { city, .. }
            | Event::RangeBooked { city, .. } => city,
        }
    }
}
