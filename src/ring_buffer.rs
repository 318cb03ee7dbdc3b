//! Pre-allocated ring buffer over a sequencer
//!
//! The buffer owns a fixed, power-of-two array of event slots constructed
//! once up front; sequences map onto slots with a mask and events are
//! mutated in place, so the hot path never allocates. Claiming, publishing
//! and gating all delegate to the hosted [`Sequencer`], which makes the
//! same type the producer handle and the consumer-side data provider.
//!
//! # Thread safety
//!
//! Slot access is coordinated entirely by sequence ownership: a producer
//! may write a slot only between claim and publish, a consumer may read it
//! only at sequences its barrier has returned. The release/acquire pair on
//! publish carries the happens-before edge between the two.

use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::barrier::SequenceBarrier;
use crate::error::Result;
use crate::event::{DataProvider, EventFactory};
use crate::poller::EventPoller;
use crate::sequence::Sequence;
use crate::sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer};
use crate::wait_strategy::WaitStrategy;

/// Fixed-capacity ring of pre-constructed event slots
pub struct RingBuffer<E> {
    slots: Box<[UnsafeCell<E>]>,
    index_mask: i64,
    sequencer: Arc<dyn Sequencer>,
}

// SAFETY: slots are plain memory; cross-thread access is serialized by
// the sequencer protocol described in the module docs. A slot has one
// writer at a time (its claimer) and readers only after the release
// publish, so `E: Send + Sync` is all that is required of the payload.
unsafe impl<E: Send + Sync> Send for RingBuffer<E> {}
unsafe impl<E: Send + Sync> Sync for RingBuffer<E> {}

impl<E> RingBuffer<E> {
    /// Create a ring buffer over an existing sequencer, filling every
    /// slot from `factory`
    pub fn new<F: EventFactory<E>>(factory: F, sequencer: Arc<dyn Sequencer>) -> Self {
        let buffer_size = sequencer.buffer_size();
        let slots = (0..buffer_size)
            .map(|_| UnsafeCell::new(factory.new_instance()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            index_mask: buffer_size as i64 - 1,
            sequencer,
        }
    }

    /// Create a ring buffer with a single-producer sequencer
    ///
    /// Fails with an invalid-argument error unless `buffer_size` is a
    /// positive power of two.
    pub fn with_single_producer<F: EventFactory<E>>(
        factory: F,
        buffer_size: usize,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self> {
        let sequencer = SingleProducerSequencer::new(buffer_size, wait_strategy)?;
        Ok(Self::new(factory, Arc::new(sequencer)))
    }

    /// Create a ring buffer with a multi-producer sequencer
    pub fn with_multi_producer<F: EventFactory<E>>(
        factory: F,
        buffer_size: usize,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self> {
        let sequencer = MultiProducerSequencer::new(buffer_size, wait_strategy)?;
        Ok(Self::new(factory, Arc::new(sequencer)))
    }

    /// Number of slots in the ring
    pub fn buffer_size(&self) -> usize {
        self.sequencer.buffer_size()
    }

    /// Borrow the slot for `sequence`.
    ///
    /// The caller must hold a claim on the sequence (producer side) or
    /// have received it from a barrier (consumer side); the mask maps any
    /// sequence onto a slot, so no further bounds check exists.
    #[inline]
    pub fn get(&self, sequence: i64) -> &E {
        // SAFETY: per the coordination protocol the slot is not mutated
        // while readers hold this borrow; writers for later rounds are
        // fenced off by the gating sequences.
        unsafe { &*self.slots[(sequence & self.index_mask) as usize].get() }
    }

    /// Mutably borrow the slot for a claimed, unpublished sequence.
    ///
    /// # Safety
    ///
    /// The caller must have claimed `sequence` via `next`/`try_next` and
    /// not yet published it, and must not create a second live borrow of
    /// the same slot. Consumers are fenced off until publish.
    #[inline]
    #[allow(clippy::mut_from_ref)] // claim protocol guarantees exclusivity
    pub unsafe fn get_mut(&self, sequence: i64) -> &mut E {
        &mut *self.slots[(sequence & self.index_mask) as usize].get()
    }

    /// Claim the next sequence, blocking while the ring is wrap-gated
    pub fn next(&self) -> i64 {
        self.sequencer.next()
    }

    /// Claim the next `n` sequences; returns the highest claimed
    pub fn next_n(&self, n: usize) -> Result<i64> {
        self.sequencer.next_n(n)
    }

    /// Claim the next sequence without blocking
    pub fn try_next(&self) -> Result<i64> {
        self.sequencer.try_next()
    }

    /// Claim the next `n` sequences without blocking
    pub fn try_next_n(&self, n: usize) -> Result<i64> {
        self.sequencer.try_next_n(n)
    }

    /// Publish a claimed sequence, making its slot visible to consumers
    pub fn publish(&self, sequence: i64) {
        self.sequencer.publish(sequence);
    }

    /// Publish the inclusive claimed range `[low..high]`
    pub fn publish_range(&self, low: i64, high: i64) {
        self.sequencer.publish_range(low, high);
    }

    /// Claim, translate, and publish one event.
    ///
    /// Publication happens in a drop guard, so even a panicking
    /// translator releases the claimed sequence and cannot wedge other
    /// producers behind a never-published claim.
    pub fn publish_event<T>(&self, translator: T) -> i64
    where
        T: FnOnce(&mut E, i64),
    {
        let sequence = self.sequencer.next();
        self.translate_and_publish(sequence, translator);
        sequence
    }

    /// Non-blocking variant of [`publish_event`](Self::publish_event);
    /// fails with `InsufficientCapacity` when the ring is full
    pub fn try_publish_event<T>(&self, translator: T) -> Result<i64>
    where
        T: FnOnce(&mut E, i64),
    {
        let sequence = self.sequencer.try_next()?;
        self.translate_and_publish(sequence, translator);
        Ok(sequence)
    }

    /// Claim, translate, and publish `n` events as one contiguous batch;
    /// the translator runs once per slot with its sequence
    pub fn publish_events<T>(&self, n: usize, mut translator: T) -> Result<i64>
    where
        T: FnMut(&mut E, i64),
    {
        let high = self.sequencer.next_n(n)?;
        let low = high - n as i64 + 1;
        {
            let _guard = RangePublishGuard {
                sequencer: &*self.sequencer,
                low,
                high,
            };
            for sequence in low..=high {
                // SAFETY: the range [low..high] was claimed above and is
                // not yet published; this is the only live borrow.
                translator(unsafe { self.get_mut(sequence) }, sequence);
            }
        }
        Ok(high)
    }

    /// Whether `sequence` has been published
    pub fn is_published(&self, sequence: i64) -> bool {
        self.sequencer.is_available(sequence)
    }

    /// Current producer cursor
    pub fn cursor(&self) -> i64 {
        self.sequencer.cursor()
    }

    /// Free slots remaining before wrap prevention blocks producers
    pub fn remaining_capacity(&self) -> i64 {
        self.sequencer.remaining_capacity()
    }

    /// Whether `required` further slots can be claimed without blocking
    pub fn has_available_capacity(&self, required: usize) -> bool {
        self.sequencer.has_available_capacity(required)
    }

    /// Register consumer sequences that gate the producers
    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.sequencer.add_gating_sequences(sequences);
    }

    /// Remove a gating sequence; returns true when it was registered
    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.sequencer.remove_gating_sequence(sequence)
    }

    /// Create a barrier for a consumer stage depending on the given
    /// upstream sequences (empty for a first-stage consumer)
    pub fn new_barrier(&self, dependent_sequences: &[Arc<Sequence>]) -> SequenceBarrier {
        SequenceBarrier::new(Arc::clone(&self.sequencer), dependent_sequences.to_vec())
    }

    fn translate_and_publish<T>(&self, sequence: i64, translator: T)
    where
        T: FnOnce(&mut E, i64),
    {
        let _guard = PublishGuard {
            sequencer: &*self.sequencer,
            sequence,
        };
        // SAFETY: `sequence` was claimed by the caller and not yet
        // published; this is the only live borrow of the slot.
        translator(unsafe { self.get_mut(sequence) }, sequence);
    }
}

impl<E: Send + Sync> RingBuffer<E> {
    /// Create a poll-mode consumer gated on the producer cursor and the
    /// given upstream sequences
    pub fn new_poller(
        self: &Arc<Self>,
        gating_sequences: &[Arc<Sequence>],
    ) -> EventPoller<E>
    where
        E: 'static,
    {
        EventPoller::new(
            Arc::clone(self) as Arc<dyn DataProvider<E>>,
            Arc::clone(&self.sequencer),
            gating_sequences.to_vec(),
        )
    }
}

impl<E: Send + Sync> DataProvider<E> for RingBuffer<E> {
    fn get(&self, sequence: i64) -> &E {
        RingBuffer::get(self, sequence)
    }
}

/// Publishes one claimed sequence on drop, including during unwind
struct PublishGuard<'a> {
    sequencer: &'a dyn Sequencer,
    sequence: i64,
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        self.sequencer.publish(self.sequence);
    }
}

/// Publishes a claimed range on drop, including during unwind
struct RangePublishGuard<'a> {
    sequencer: &'a dyn Sequencer,
    low: i64,
    high: i64,
}

impl Drop for RangePublishGuard<'_> {
    fn drop(&mut self) {
        self.sequencer.publish_range(self.low, self.high);
    }
}
