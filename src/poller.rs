//! Poll-mode event consumption
//!
//! An [`EventPoller`] is the pull-flavored alternative to the batch event
//! processor: instead of parking a dedicated thread inside a wait
//! strategy, the caller invokes `poll` whenever it wants to drain, and the
//! poller reports whether it processed events, is gated behind an upstream
//! consumer, or found nothing outstanding. Useful for embedding a consumer
//! into an existing event loop.
//!
//! The poller's sequence must be registered as a gating sequence like any
//! other consumer, or producers will overrun it.

use std::sync::Arc;

use crate::event::{DataProvider, HandlerError};
use crate::sequence::Sequence;
use crate::sequencer::Sequencer;
use crate::utils::min_cursor_sequence;

/// Outcome of one `poll` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// At least one event was handed to the callback
    Processing,
    /// Events are published but an upstream dependency has not released
    /// them yet
    Gating,
    /// Nothing outstanding
    Idle,
}

/// Pull-based consumer over a ring buffer
pub struct EventPoller<E> {
    data_provider: Arc<dyn DataProvider<E>>,
    sequencer: Arc<dyn Sequencer>,
    sequence: Arc<Sequence>,
    gating_sequences: Vec<Arc<Sequence>>,
}

impl<E> EventPoller<E> {
    pub(crate) fn new(
        data_provider: Arc<dyn DataProvider<E>>,
        sequencer: Arc<dyn Sequencer>,
        gating_sequences: Vec<Arc<Sequence>>,
    ) -> Self {
        Self {
            data_provider,
            sequencer,
            sequence: Arc::new(Sequence::default()),
            gating_sequences,
        }
    }

    /// The poller's progress sequence, for gating registration
    pub fn sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.sequence)
    }

    /// Drain available events into `handler`.
    ///
    /// The callback returns `Ok(true)` to keep consuming within this
    /// poll, `Ok(false)` to stop after the current event. On `Err` the
    /// poller keeps its sequence at the last fully handled event, so the
    /// failing event is redelivered on the next poll, and the error is
    /// returned to the caller.
    pub fn poll<H>(&self, mut handler: H) -> Result<PollState, HandlerError>
    where
        H: FnMut(&E, i64, bool) -> Result<bool, HandlerError>,
    {
        // Sole writer of this sequence; a relaxed read is sufficient.
        let current = self.sequence.get_relaxed();
        let next = current + 1;

        let upstream = min_cursor_sequence(&self.gating_sequences, self.sequencer.cursor());
        let available = self.sequencer.highest_published_sequence(next, upstream);

        if next <= available {
            let mut processed = current;
            let result = (|| {
                loop {
                    let sequence = processed + 1;
                    if sequence > available {
                        return Ok(true);
                    }
                    let event = self.data_provider.get(sequence);
                    let keep_going = handler(event, sequence, sequence == available)?;
                    processed = sequence;
                    if !keep_going {
                        return Ok(false);
                    }
                }
            })();
            self.sequence.set(processed);
            result.map(|_| PollState::Processing)
        } else if self.sequencer.cursor() >= next {
            Ok(PollState::Gating)
        } else {
            Ok(PollState::Idle)
        }
    }
}
