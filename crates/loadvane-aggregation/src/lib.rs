//! loadvane-aggregation — time-windowed load aggregation.
//!
//! Accumulates timestamped float samples (concurrency, request rate)
//! into fixed-width time buckets so a scaling decision loop can read
//! recent aggregate load without re-processing raw samples. Producers
//! record concurrently; a single consumer reads aggregates and evicts
//! stale buckets to bound memory.
//!
//! # Architecture
//!
//! ```text
//! TimedFloat64Buckets
//!   ├── record() ← called per scraped sample, from any producer thread
//!   ├── for_each_bucket() → applies aggregator callbacks to each bucket
//!   ├── remove_older_than() → evicts stale buckets (bounded memory)
//!   └── is_empty() → lifecycle/cleanup decisions
//! ```

pub mod buckets;

pub use buckets::{Aggregator, TimedFloat64Buckets};
