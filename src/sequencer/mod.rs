//! Sequencers: slot claim and publication engines
//!
//! A sequencer owns the producer cursor and the set of gating sequences
//! (downstream consumer cursors) that bound how far producers may run
//! ahead. Two variants exist with the same contract:
//!
//! - [`SingleProducerSequencer`] keeps its claim state in plain cells and
//!   is only safe with exactly one publishing thread.
//! - [`MultiProducerSequencer`] claims via CAS on the shared cursor and
//!   tracks per-slot availability rounds so out-of-order publishes expose
//!   only the contiguous published prefix.
//!
//! Wrap prevention is the one invariant both enforce: a claim for
//! sequence `s` blocks (or fails, for `try_next`) while
//! `s - buffer_size` is still ahead of the slowest gating sequence.

pub mod multi;
pub mod single;

pub use multi::MultiProducerSequencer;
pub use single::SingleProducerSequencer;

use std::sync::Arc;

use crate::error::{Result, SurgeError};
use crate::sequence::Sequence;
use crate::wait_strategy::WaitStrategy;

/// Claim, publish, and gating operations shared by both sequencer variants
pub trait Sequencer: Send + Sync {
    /// Capacity of the ring this sequencer coordinates
    fn buffer_size(&self) -> usize;

    /// Current value of the producer cursor
    fn cursor(&self) -> i64;

    /// Shared handle to the producer cursor for barrier construction
    fn cursor_sequence(&self) -> Arc<Sequence>;

    /// Wait strategy shared with consumers of this sequencer
    fn wait_strategy(&self) -> Arc<dyn WaitStrategy>;

    /// Whether `required` further slots can be claimed without blocking
    fn has_available_capacity(&self, required: usize) -> bool;

    /// Free slots remaining before wrap prevention kicks in
    fn remaining_capacity(&self) -> i64;

    /// Claim the next sequence, blocking while the ring is wrap-gated
    fn next(&self) -> i64;

    /// Claim the next `n` contiguous sequences, blocking while wrap-gated;
    /// returns the highest claimed sequence
    fn next_n(&self, n: usize) -> Result<i64>;

    /// Claim the next sequence without blocking
    fn try_next(&self) -> Result<i64>;

    /// Claim the next `n` contiguous sequences without blocking;
    /// fails with `InsufficientCapacity` when wrap prevention would block
    fn try_next_n(&self, n: usize) -> Result<i64>;

    /// Mark a claimed sequence as published and wake blocked consumers.
    /// Must be called exactly once per claimed sequence.
    fn publish(&self, sequence: i64);

    /// Publish the inclusive range `[low..high]` of claimed sequences
    fn publish_range(&self, low: i64, high: i64);

    /// Whether `sequence` has been published and is safe to read
    fn is_available(&self, sequence: i64) -> bool;

    /// Highest sequence in `[next_sequence..available_sequence]` such that
    /// every sequence up to it is published; `next_sequence - 1` when the
    /// lower bound itself is unpublished
    fn highest_published_sequence(&self, next_sequence: i64, available_sequence: i64) -> i64;

    /// Register consumer sequences that gate this producer
    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]);

    /// Remove a gating sequence; returns true when it was registered
    fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool;

    /// Minimum of the gating sequences and the cursor
    fn minimum_gating_sequence(&self) -> i64;
}

/// Shared claim-argument validation
pub(crate) fn check_claim_size(n: usize, buffer_size: usize) -> Result<()> {
    if n < 1 {
        return Err(SurgeError::invalid_argument("n must be >= 1"));
    }
    if n > buffer_size {
        return Err(SurgeError::invalid_argument(format!(
            "n ({n}) must not exceed the buffer size ({buffer_size})"
        )));
    }
    Ok(())
}

/// Shared buffer-size validation for sequencer constructors
pub(crate) fn check_buffer_size(buffer_size: usize) -> Result<()> {
    if buffer_size < 1 {
        return Err(SurgeError::invalid_argument(
            "buffer size must be at least 1",
        ));
    }
    if !buffer_size.is_power_of_two() {
        return Err(SurgeError::invalid_argument(
            "buffer size must be a power of 2",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_claim_size() {
        assert!(check_claim_size(1, 8).is_ok());
        assert!(check_claim_size(8, 8).is_ok());
        assert!(check_claim_size(0, 8).is_err());
        assert!(check_claim_size(9, 8).is_err());
    }

    #[test]
    fn test_check_buffer_size() {
        assert!(check_buffer_size(1).is_ok());
        assert!(check_buffer_size(1024).is_ok());
        assert!(check_buffer_size(0).is_err());
        assert!(check_buffer_size(1000).is_err());
    }
}
