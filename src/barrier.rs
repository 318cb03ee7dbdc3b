//! Sequence barrier: the consumer-facing gate on new work
//!
//! A barrier ties together the producer cursor, the sequences of any
//! upstream consumers this stage depends on, and the shared wait strategy.
//! `wait_for` hands back the highest sequence safe to read; for sequencers
//! that publish out of order the returned value is capped to the
//! contiguous published prefix so an unpublished slot is never exposed.
//!
//! Barriers also carry the cooperative shutdown signal: `alert` raises a
//! flag every wait loop observes and wakes any parked waiters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, SurgeError};
use crate::sequence::Sequence;
use crate::sequencer::Sequencer;
use crate::wait_strategy::WaitStrategy;

/// Gate for one consumer stage over the producer cursor and its upstream
/// dependencies
pub struct SequenceBarrier {
    sequencer: Arc<dyn Sequencer>,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    dependent_sequences: Vec<Arc<Sequence>>,
    alerted: AtomicBool,
}

impl SequenceBarrier {
    /// Create a barrier gated on `sequencer`'s cursor and the given
    /// upstream consumer sequences (empty for a first-stage consumer)
    pub fn new(sequencer: Arc<dyn Sequencer>, dependent_sequences: Vec<Arc<Sequence>>) -> Self {
        let cursor = sequencer.cursor_sequence();
        let wait_strategy = sequencer.wait_strategy();
        Self {
            sequencer,
            wait_strategy,
            cursor,
            dependent_sequences,
            alerted: AtomicBool::new(false),
        }
    }

    /// Wait for `sequence` to be safe to read.
    ///
    /// Returns the highest published sequence reachable without gaps,
    /// which may exceed the request. Fails with `Alerted` on shutdown or
    /// `TimedOut` when the wait strategy is deadline-bound.
    pub fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.check_alert()?;

        let available = self.wait_strategy.wait_for(
            sequence,
            &self.cursor,
            &self.dependent_sequences,
            &self.alerted,
        )?;

        if available < sequence {
            return Ok(available);
        }

        // Multi-producer cursors move at claim time; trim to what is
        // actually published.
        Ok(self
            .sequencer
            .highest_published_sequence(sequence, available))
    }

    /// Consumer-visible position of the producer cursor
    pub fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    /// Raise the alert flag and wake any parked waiters
    pub fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Lower the alert flag
    pub fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }

    /// Whether the alert flag is raised
    pub fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    /// Fail with `Alerted` when the alert flag is raised
    pub fn check_alert(&self) -> Result<()> {
        if self.is_alerted() {
            return Err(SurgeError::Alerted);
        }
        Ok(())
    }
}
