pub mod allocator;
pub mod compactor;
pub mod error;
pub mod finder;
pub mod http;
pub mod limits;
pub mod model;
pub mod observability;
pub mod service;
pub mod store;
pub mod wal;
