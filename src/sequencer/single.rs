//! Single-producer sequencer
//!
//! The fastest claim path: with exactly one publishing thread there is no
//! contention on claims, so the pending position and the cached gating
//! minimum live in plain cells touched only by that thread. The shared
//! cursor is still release-published so consumers observe slot writes.

use std::cell::Cell;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use crossbeam::utils::Backoff;

use crate::error::{Result, SurgeError};
use crate::sequence::Sequence;
use crate::sequencer::{check_buffer_size, check_claim_size, Sequencer};
use crate::utils::SequenceGroup;
use crate::wait_strategy::WaitStrategy;

/// Producer-private claim state
///
/// `next_value` is the highest claimed sequence, `cached_gating` the last
/// observed minimum of the gating sequences. Both start at -1.
struct ClaimState {
    next_value: Cell<i64>,
    cached_gating: Cell<i64>,
}

// SAFETY: the cells are read and written exclusively by the single
// producer thread. The `Sequencer` contract for this type requires one
// publishing thread; sharing the sequencer with consumers only exposes
// the atomic cursor and gating group, never these cells.
unsafe impl Sync for ClaimState {}

/// Sequencer for exactly one publishing thread (not thread-safe across
/// producers)
pub struct SingleProducerSequencer {
    buffer_size: usize,
    cursor: Arc<Sequence>,
    wait_strategy: Arc<dyn WaitStrategy>,
    gating_sequences: SequenceGroup,
    claim: ClaimState,
}

impl SingleProducerSequencer {
    /// Create a sequencer for a power-of-two ring of `buffer_size` slots
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        check_buffer_size(buffer_size)?;
        Ok(Self {
            buffer_size,
            cursor: Arc::new(Sequence::default()),
            wait_strategy,
            gating_sequences: SequenceGroup::new(),
            claim: ClaimState {
                next_value: Cell::new(Sequence::INITIAL_VALUE),
                cached_gating: Cell::new(Sequence::INITIAL_VALUE),
            },
        })
    }

    /// Blocking claim of `n` pre-validated sequences
    fn claim_next(&self, n: usize) -> i64 {
        let next_value = self.claim.next_value.get();
        let next_sequence = next_value + n as i64;
        let wrap_point = next_sequence - self.buffer_size as i64;
        let cached_gating = self.claim.cached_gating.get();

        if wrap_point > cached_gating || cached_gating > next_value {
            fence(Ordering::SeqCst);

            let backoff = Backoff::new();
            let mut min_sequence = self.gating_sequences.minimum(next_value);
            while wrap_point > min_sequence {
                // Politeness only; progress comes from retrying the read.
                backoff.snooze();
                min_sequence = self.gating_sequences.minimum(next_value);
            }
            self.claim.cached_gating.set(min_sequence);
        }

        self.claim.next_value.set(next_sequence);
        next_sequence
    }

    fn has_capacity(&self, required: usize) -> bool {
        let next_value = self.claim.next_value.get();
        let wrap_point = (next_value + required as i64) - self.buffer_size as i64;
        let cached_gating = self.claim.cached_gating.get();

        if wrap_point > cached_gating || cached_gating > next_value {
            // StoreLoad: prior slot writes must be ordered before the
            // gating reads below, or a stale minimum could admit a claim
            // that overwrites an unread slot.
            fence(Ordering::SeqCst);

            let min_sequence = self.gating_sequences.minimum(next_value);
            self.claim.cached_gating.set(min_sequence);
            if wrap_point > min_sequence {
                return false;
            }
        }
        true
    }

    /// Set the claim position directly, bypassing wrap prevention.
    ///
    /// Recovery-only administrative primitive.
    ///
    /// # Safety
    ///
    /// Must not race `next`, `try_next`, or `publish`; the caller has to
    /// guarantee the producer is quiescent and that every sequence at or
    /// below `sequence` has been (or will never be) published.
    pub unsafe fn claim(&self, sequence: i64) {
        self.claim.next_value.set(sequence);
    }
}

impl Sequencer for SingleProducerSequencer {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    fn cursor_sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    fn wait_strategy(&self) -> Arc<dyn WaitStrategy> {
        Arc::clone(&self.wait_strategy)
    }

    fn has_available_capacity(&self, required: usize) -> bool {
        self.has_capacity(required)
    }

    fn remaining_capacity(&self) -> i64 {
        let next_value = self.claim.next_value.get();
        let consumed = self.gating_sequences.minimum(next_value);
        self.buffer_size as i64 - (next_value - consumed)
    }

    fn next(&self) -> i64 {
        self.claim_next(1)
    }

    fn next_n(&self, n: usize) -> Result<i64> {
        check_claim_size(n, self.buffer_size)?;
        Ok(self.claim_next(n))
    }

    fn try_next(&self) -> Result<i64> {
        self.try_next_n(1)
    }

    fn try_next_n(&self, n: usize) -> Result<i64> {
        check_claim_size(n, self.buffer_size)?;

        if !self.has_capacity(n) {
            return Err(SurgeError::InsufficientCapacity);
        }

        let next_sequence = self.claim.next_value.get() + n as i64;
        self.claim.next_value.set(next_sequence);
        Ok(next_sequence)
    }

    fn publish(&self, sequence: i64) {
        self.cursor.set(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, _low: i64, high: i64) {
        // Contiguous by construction; the high watermark covers the range.
        self.publish(high);
    }

    fn is_available(&self, sequence: i64) -> bool {
        let cursor = self.cursor.get();
        sequence <= cursor && sequence > cursor - self.buffer_size as i64
    }

    fn highest_published_sequence(&self, _next_sequence: i64, available_sequence: i64) -> i64 {
        available_sequence
    }

    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.gating_sequences.add_all(sequences, &self.cursor);
    }

    fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.gating_sequences.remove(sequence)
    }

    fn minimum_gating_sequence(&self) -> i64 {
        self.gating_sequences.minimum(self.cursor.get())
    }
}
