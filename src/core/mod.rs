//! Pure, deterministic sync logic. No I/O.

pub mod executors;
pub mod schema;
pub mod tags;
