//! Time-bucketed float accumulation.
//!
//! [`TimedFloat64Buckets`] sums timestamped samples into buckets of a
//! fixed width (the *granularity*). Bucket keys are timestamps truncated
//! to a multiple of the granularity, anchored to `UNIX_EPOCH`, so the
//! same input always lands in the same bucket regardless of which
//! process or thread recorded it.
//!
//! The structure takes `&self` on every operation and is `Send + Sync`;
//! the owning component shares it with producers and the consumer
//! through `Arc` handles.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A bucket-visiting callback, applied once per bucket with the bucket's
/// timestamp key and accumulated value.
pub type Aggregator<'a> = &'a mut dyn FnMut(SystemTime, f64);

/// Time-windowed float accumulator.
///
/// Samples recorded within the same granularity window sum into one
/// bucket. Buckets exist only where samples were recorded; eviction is
/// explicit via [`remove_older_than`](Self::remove_older_than), on
/// whatever cadence the consumer chooses.
///
/// # Concurrency
///
/// The bucket map is protected by a `std::sync::Mutex`. Lock hold time
/// is a single hash map lookup plus a numeric add — aggregator callbacks
/// run *outside* the lock, against a snapshot taken under it, so a
/// bucket is never observed with a partially-summed value mid-iteration.
#[derive(Debug)]
pub struct TimedFloat64Buckets {
    /// Bucket width; zero disables truncation entirely.
    granularity: Duration,
    /// Truncated timestamp → accumulated value.
    buckets: Mutex<HashMap<SystemTime, f64>>,
}

impl TimedFloat64Buckets {
    /// Create an empty bucket set with the given bucket width.
    ///
    /// A zero `granularity` means no truncation: every distinct
    /// timestamp is its own bucket.
    pub fn new(granularity: Duration) -> Self {
        Self {
            granularity,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Add a sample to the bucket its timestamp truncates into.
    ///
    /// `source` identifies the reporting agent for diagnostics only; all
    /// sources sum into the same bucket. Accumulation is plain IEEE-754
    /// addition, so a non-finite `value` (NaN, ±∞) poisons that bucket's
    /// sum — screening samples is the caller's responsibility.
    pub fn record(&self, time: SystemTime, source: &str, value: f64) {
        let key = truncate(time, self.granularity);
        {
            let mut buckets = self.buckets.lock().unwrap();
            *buckets.entry(key).or_insert(0.0) += value;
        }
        tracing::trace!(source = %source, value, bucket = ?key, "recorded sample");
    }

    /// Apply every aggregator to every current bucket.
    ///
    /// Returns `false` without invoking anything if there are no
    /// buckets, `true` otherwise. Iteration order across buckets is
    /// unspecified; for each bucket the aggregators run in slice order.
    ///
    /// Callbacks see a consistent snapshot: samples recorded while they
    /// run are picked up by the next call.
    pub fn for_each_bucket(&self, aggregators: &mut [Aggregator<'_>]) -> bool {
        let snapshot: Vec<(SystemTime, f64)> = {
            let buckets = self.buckets.lock().unwrap();
            buckets.iter().map(|(&key, &value)| (key, value)).collect()
        };
        if snapshot.is_empty() {
            return false;
        }
        for &(bucket_time, value) in &snapshot {
            for aggregator in aggregators.iter_mut() {
                aggregator(bucket_time, value);
            }
        }
        true
    }

    /// Drop every bucket whose key is strictly earlier than `threshold`.
    ///
    /// Buckets keyed exactly at `threshold` are retained. Idempotent.
    pub fn remove_older_than(&self, threshold: SystemTime) {
        let removed = {
            let mut buckets = self.buckets.lock().unwrap();
            let before = buckets.len();
            buckets.retain(|&key, _| key >= threshold);
            before - buckets.len()
        };
        if removed > 0 {
            tracing::debug!(removed, threshold = ?threshold, "evicted stale buckets");
        }
    }

    /// True if no buckets are currently held.
    pub fn is_empty(&self) -> bool {
        self.buckets.lock().unwrap().is_empty()
    }

    /// Number of buckets currently held.
    pub fn len(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }

    /// The bucket width this set was constructed with.
    pub fn granularity(&self) -> Duration {
        self.granularity
    }
}

/// Round `time` down to the nearest multiple of `granularity` relative
/// to `UNIX_EPOCH`.
///
/// Total over all representable timestamps: a zero granularity returns
/// `time` unchanged, and pre-epoch timestamps still round toward the
/// past (a true floor, not a round-toward-epoch).
fn truncate(time: SystemTime, granularity: Duration) -> SystemTime {
    if granularity.is_zero() {
        return time;
    }
    let width = granularity.as_nanos();
    match time.duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => {
            let truncated = since_epoch.as_nanos() / width * width;
            UNIX_EPOCH + duration_from_nanos(truncated)
        }
        Err(err) => {
            let before_epoch = err.duration().as_nanos();
            let remainder = before_epoch % width;
            if remainder == 0 {
                time
            } else {
                UNIX_EPOCH - duration_from_nanos(before_epoch - remainder + width)
            }
        }
    }
}

fn duration_from_nanos(nanos: u128) -> Duration {
    // Duration::from_nanos takes u64, which caps out mid-2554; split
    // into secs + subsec nanos to cover the full SystemTime range.
    Duration::new(
        (nanos / NANOS_PER_SEC) as u64,
        (nanos % NANOS_PER_SEC) as u32,
    )
}
