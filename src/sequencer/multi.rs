//! Multi-producer sequencer
//!
//! Claims are serialized by CAS on the shared cursor, so the cursor races
//! ahead of the slots actually written. Publication is therefore tracked
//! per slot: each cell of the availability array records the round number
//! (`sequence >> log2(buffer_size)`) most recently published into that
//! slot. A sequence is readable iff its slot's recorded round matches the
//! round the sequence implies, and consumers only ever see the contiguous
//! published prefix.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crossbeam::utils::Backoff;

use crate::error::{Result, SurgeError};
use crate::sequence::Sequence;
use crate::sequencer::{check_buffer_size, check_claim_size, Sequencer};
use crate::utils::{log2, SequenceGroup};
use crate::wait_strategy::WaitStrategy;

/// Sequencer safe for concurrent publishing threads
pub struct MultiProducerSequencer {
    buffer_size: usize,
    index_mask: i64,
    index_shift: u32,
    cursor: Arc<Sequence>,
    wait_strategy: Arc<dyn WaitStrategy>,
    gating_sequences: SequenceGroup,
    gating_cache: Sequence,
    /// Round number last published into each slot, -1 when never published
    available: Box<[AtomicI64]>,
}

impl MultiProducerSequencer {
    /// Create a sequencer for a power-of-two ring of `buffer_size` slots
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        check_buffer_size(buffer_size)?;
        let available = (0..buffer_size)
            .map(|_| AtomicI64::new(-1))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            buffer_size,
            index_mask: buffer_size as i64 - 1,
            index_shift: log2(buffer_size),
            cursor: Arc::new(Sequence::default()),
            wait_strategy,
            gating_sequences: SequenceGroup::new(),
            gating_cache: Sequence::default(),
            available,
        })
    }

    #[inline]
    fn availability_round(&self, sequence: i64) -> i64 {
        sequence >> self.index_shift
    }

    #[inline]
    fn availability_index(&self, sequence: i64) -> usize {
        (sequence & self.index_mask) as usize
    }

    /// Release-publish the round number for one claimed sequence.
    ///
    /// The release store pairs with the acquire load in `is_available`;
    /// together they carry the happens-before from the producer's slot
    /// writes to any consumer that observes the sequence as published.
    #[inline]
    fn set_available(&self, sequence: i64) {
        let round = self.availability_round(sequence);
        self.available[self.availability_index(sequence)].store(round, Ordering::Release);
    }

    /// Blocking CAS claim of `n` pre-validated sequences
    fn claim_next(&self, n: usize) -> i64 {
        let backoff = Backoff::new();
        loop {
            let current = self.cursor.get();
            let next = current + n as i64;
            let wrap_point = next - self.buffer_size as i64;
            let cached_gating = self.gating_cache.get();

            if wrap_point > cached_gating || cached_gating > current {
                let gating_sequence = self.gating_sequences.minimum(current);
                if wrap_point > gating_sequence {
                    backoff.snooze();
                    continue;
                }
                self.gating_cache.set(gating_sequence);
            } else if self.cursor.compare_and_set(current, next) {
                return next;
            }
        }
    }

    fn has_capacity(&self, required: usize, cursor_value: i64) -> bool {
        let wrap_point = (cursor_value + required as i64) - self.buffer_size as i64;
        let cached_gating = self.gating_cache.get();

        if wrap_point > cached_gating || cached_gating > cursor_value {
            let min_sequence = self.gating_sequences.minimum(cursor_value);
            self.gating_cache.set(min_sequence);
            if wrap_point > min_sequence {
                return false;
            }
        }
        true
    }

    /// Set the cursor directly, bypassing the CAS claim protocol.
    ///
    /// Recovery-only administrative primitive.
    ///
    /// # Safety
    ///
    /// Must not race `next`, `try_next`, or `publish` on any thread; the
    /// caller has to guarantee all producers are quiescent. Availability
    /// state for already-published slots is left untouched.
    pub unsafe fn claim(&self, sequence: i64) {
        self.cursor.set(sequence);
    }
}

impl Sequencer for MultiProducerSequencer {
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
        self.has_capacity(required, self.cursor.get())
    }

    fn remaining_capacity(&self) -> i64 {
        let produced = self.cursor.get();
        let consumed = self.gating_sequences.minimum(produced);
        self.buffer_size as i64 - (produced - consumed)
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

        loop {
            let current = self.cursor.get();
            let next = current + n as i64;

            if !self.has_capacity(n, current) {
                return Err(SurgeError::InsufficientCapacity);
            }
            if self.cursor.compare_and_set(current, next) {
                return Ok(next);
            }
        }
    }

    fn publish(&self, sequence: i64) {
        self.set_available(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, low: i64, high: i64) {
        for sequence in low..=high {
            self.set_available(sequence);
        }
        self.wait_strategy.signal_all_when_blocking();
    }

    fn is_available(&self, sequence: i64) -> bool {
        let cell = &self.available[self.availability_index(sequence)];
        cell.load(Ordering::Acquire) == self.availability_round(sequence)
    }

    fn highest_published_sequence(&self, next_sequence: i64, available_sequence: i64) -> i64 {
        for sequence in next_sequence..=available_sequence {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait_strategy::BusySpinWaitStrategy;
    use std::collections::HashSet;
    use std::thread;

    fn sequencer(size: usize) -> MultiProducerSequencer {
        MultiProducerSequencer::new(size, Arc::new(BusySpinWaitStrategy::new())).unwrap()
    }

    #[test]
    fn test_rejects_invalid_buffer_size() {
        let strategy: Arc<dyn WaitStrategy> = Arc::new(BusySpinWaitStrategy::new());
        assert!(MultiProducerSequencer::new(0, strategy.clone()).is_err());
        assert!(MultiProducerSequencer::new(100, strategy).is_err());
    }

    #[test]
    fn test_cursor_advances_on_claim_not_publish() {
        let sequencer = sequencer(8);
        assert_eq!(sequencer.next(), 0);
        assert_eq!(sequencer.cursor(), 0);
        assert!(!sequencer.is_available(0));
        sequencer.publish(0);
        assert!(sequencer.is_available(0));
    }

    #[test]
    fn test_out_of_order_publish_hides_gap() {
        let sequencer = sequencer(8);
        assert_eq!(sequencer.next_n(3).unwrap(), 2);

        sequencer.publish(2);
        assert_eq!(sequencer.highest_published_sequence(0, 2), -1);

        sequencer.publish(0);
        assert_eq!(sequencer.highest_published_sequence(0, 2), 0);

        sequencer.publish(1);
        assert_eq!(sequencer.highest_published_sequence(0, 2), 2);
    }

    #[test]
    fn test_availability_rounds_distinguish_laps() {
        let sequencer = sequencer(4);
        let consumer = Arc::new(Sequence::default());
        sequencer.add_gating_sequences(std::slice::from_ref(&consumer));

        sequencer.next_n(4).unwrap();
        sequencer.publish_range(0, 3);
        consumer.set(3);

        // Second lap reuses slot 0; sequence 0 must no longer look
        // published once sequence 4 lands in its slot.
        assert_eq!(sequencer.next(), 4);
        sequencer.publish(4);
        assert!(sequencer.is_available(4));
        assert!(!sequencer.is_available(0));
    }

    #[test]
    fn test_try_next_insufficient_capacity() {
        let sequencer = sequencer(4);
        let consumer = Arc::new(Sequence::default());
        sequencer.add_gating_sequences(std::slice::from_ref(&consumer));

        for s in 0..4 {
            sequencer.try_next().unwrap();
            sequencer.publish(s);
        }
        assert!(matches!(
            sequencer.try_next(),
            Err(SurgeError::InsufficientCapacity)
        ));
        assert_eq!(sequencer.remaining_capacity(), 0);
    }

    #[test]
    fn test_concurrent_claims_are_disjoint() {
        let sequencer = Arc::new(sequencer(1024));
        let consumer = Arc::new(Sequence::default());
        sequencer.add_gating_sequences(std::slice::from_ref(&consumer));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let sequencer = Arc::clone(&sequencer);
            handles.push(thread::spawn(move || {
                let mut claimed = Vec::with_capacity(128);
                for _ in 0..128 {
                    let sequence = sequencer.next();
                    sequencer.publish(sequence);
                    claimed.push(sequence);
                }
                claimed
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            for sequence in handle.join().unwrap() {
                assert!(all.insert(sequence), "sequence {sequence} claimed twice");
            }
        }
        assert_eq!(all.len(), 512);
        assert_eq!(sequencer.cursor(), 511);
        assert_eq!(sequencer.highest_published_sequence(0, 511), 511);
    }

    #[test]
    fn test_unsafe_claim_moves_cursor() {
        let sequencer = sequencer(8);
        unsafe { sequencer.claim(5) };
        assert_eq!(sequencer.cursor(), 5);
    }
}
