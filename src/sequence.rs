//! Atomic sequence counter with cache-line isolation
//!
//! A `Sequence` is the unit of coordination in Surge: the producer cursor,
//! every consumer's progress counter, and the multi-producer gating cache
//! are all instances of this type. It is a 64-bit signed counter starting
//! at -1 with acquire/release semantics plus compare-and-set, padded so
//! that two hot sequences can never land on the same prefetched line pair.

use std::sync::atomic::{AtomicI64, Ordering};

use static_assertions::const_assert;

use crate::constants::{CACHE_LINE_SIZE, INITIAL_CURSOR_VALUE, SEQUENCE_ALIGNMENT};

/// Cache-line padded atomic sequence counter
///
/// Uses 128-byte alignment to prevent false sharing on modern Intel CPUs
/// that prefetch two cache lines at a time. The trailing pad keeps the
/// struct size at a full alignment unit so adjacent heap allocations
/// cannot share the value's line either.
///
/// # Memory ordering
///
/// These are not general-purpose atomics. `set` is a release publish and
/// `get` an acquire observe; together they carry the happens-before edge
/// from a producer's slot writes to a consumer's slot reads. Plain
/// (relaxed) reads are available for counters with a single observer.
#[repr(align(128))]
pub struct Sequence {
    value: AtomicI64,
    _padding: [u8; 120],
}

const_assert!(std::mem::align_of::<Sequence>() >= CACHE_LINE_SIZE);
const_assert!(std::mem::align_of::<Sequence>() >= SEQUENCE_ALIGNMENT);
const_assert!(std::mem::size_of::<Sequence>() == 128);

impl Sequence {
    /// Initial value of every sequence (-1, "nothing claimed yet")
    pub const INITIAL_VALUE: i64 = INITIAL_CURSOR_VALUE;

    /// Create a sequence with the given starting value
    pub fn new(initial_value: i64) -> Self {
        Self {
            value: AtomicI64::new(initial_value),
            _padding: [0; 120],
        }
    }

    /// Acquire read of the current value
    ///
    /// Pairs with `set`: all writes that happened before the matching
    /// release store are visible after this load returns its value.
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Plain (relaxed) read
    ///
    /// Only valid where the caller is the sole writer of this sequence or
    /// staleness is acceptable, e.g. a consumer reading back its own
    /// progress counter.
    #[inline]
    pub fn get_relaxed(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Release write of a new value
    ///
    /// Publishes every prior write by this thread to any thread that
    /// subsequently observes the new value via `get`.
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Sequentially consistent write
    ///
    /// Stronger than `set`: also orders the store against later loads on
    /// the writing thread (StoreLoad), which `Release` alone does not.
    #[inline]
    pub fn set_volatile(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Atomically replace `expected` with `new_value`
    ///
    /// Returns true when the swap happened. The multi-producer claim loop
    /// relies on the success ordering being a full fence so claims form a
    /// total order.
    #[inline]
    pub fn compare_and_set(&self, expected: i64, new_value: i64) -> bool {
        self.value
            .compare_exchange(expected, new_value, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
    }

    /// Atomically add `increment` and return the resulting value
    #[inline]
    pub fn add_and_get(&self, increment: i64) -> i64 {
        self.value.fetch_add(increment, Ordering::SeqCst) + increment
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(Self::INITIAL_VALUE)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Sequence").field(&self.get()).finish()
    }
}
