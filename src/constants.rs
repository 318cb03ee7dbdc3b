//! Surge tuning constants and configuration values
//!
//! This module contains performance tuning constants used throughout the
//! library. Wait strategies and sequencers take these as defaults; most
//! of them can be overridden per instance.

/// Default ring buffer size (must be power of 2 for mask addressing)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 64;

/// Cache line size for alignment checks (64 bytes on most modern CPUs)
pub const CACHE_LINE_SIZE: usize = 64;

/// Sequence counters are padded out to two cache lines; modern Intel
/// parts prefetch adjacent line pairs, so 64 bytes is not enough
pub const SEQUENCE_ALIGNMENT: usize = 2 * CACHE_LINE_SIZE;

/// Initial value of every sequence counter
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// Busy-spin iterations before the yielding strategy starts yielding
pub const YIELDING_SPIN_TRIES: u32 = 100;

/// Spin-then-yield iterations before the sleeping strategy starts parking
pub const SLEEPING_RETRIES: u32 = 200;

/// Park interval for the sleeping strategy, in nanoseconds
pub const SLEEPING_PARK_NANOS: u64 = 100;

/// Default deadline for the timeout blocking strategy, in microseconds
pub const DEFAULT_TIMEOUT_MICROS: u64 = 1_000;

/// Messages per demo batch in the throughput demo binary
pub const DEMO_BATCH_SIZE: usize = 1_000;

/// Nanoseconds per second, for throughput reporting
pub const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Scale factor for reporting throughput in millions of messages
pub const MESSAGES_PER_MILLION: f64 = 1_000_000.0;
