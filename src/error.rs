use crate::store::StoreError;

/// The caller-facing error taxonomy. Contention on individual ranges is NOT
/// an error — it surfaces as `BookingOutcome { committed: false, .. }` in the
/// book report so partial success stays visible.
#[derive(Debug)]
pub enum AllocationError {
    /// Malformed request: nothing was attempted.
    InvalidArgument(&'static str),
    /// No pool exists for the named city.
    NotFound(String),
    /// Every requested city came back without a single candidate block.
    NoCandidates,
    /// A book request modified zero seats across all its ranges — the
    /// selection was stale or already booked; caller should re-find.
    NothingBooked,
    /// Pool creation for a city that already has one.
    PoolExists(String),
    LimitExceeded(&'static str),
    /// The store or its WAL failed; transient, safe to retry.
    Store(String),
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            AllocationError::NotFound(city) => write!(f, "no pool data found for city: {city}"),
            AllocationError::NoCandidates => {
                write!(f, "no continuous sequences of available ids found")
            }
            AllocationError::NothingBooked => write!(f, "no ids found or already booked"),
            AllocationError::PoolExists(city) => write!(f, "pool already exists: {city}"),
            AllocationError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            AllocationError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for AllocationError {}

impl From<StoreError> for AllocationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::PoolNotFound(city) => AllocationError::NotFound(city),
            StoreError::PoolExists(city) => AllocationError::PoolExists(city),
            StoreError::InvalidCity(msg) => AllocationError::InvalidArgument(msg),
            StoreError::LimitExceeded(msg) => AllocationError::LimitExceeded(msg),
            StoreError::Wal(e) => AllocationError::Store(e),
        }
    }
}
