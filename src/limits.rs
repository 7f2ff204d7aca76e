//! Hard caps. Every mutation path checks these before touching state so a
//! single bad request can't blow up memory or the WAL.

/// Max number of city pools in one deployment.
pub const MAX_POOLS: usize = 10_000;

/// Max length of a city name (before sanitization).
pub const MAX_CITY_NAME_LEN: usize = 128;

/// Max seats a single pool may hold.
pub const MAX_SEATS_PER_POOL: usize = 1_000_000;

/// Max seats accepted in one create/add batch.
pub const MAX_SEED_BATCH: usize = 100_000;

/// Max ranges in a single book request.
pub const MAX_BOOK_RANGES: usize = 100;

/// Max candidate ranges a find may request per city.
pub const MAX_RESULTS: usize = 100;

/// Max block length a find or book may cover.
pub const MAX_BLOCK_LENGTH: u64 = 100_000;
