//! Utility functions and helpers for the Surge library
//!
//! Support glue shared by the sequencers and barriers: minimum-of-sequences
//! scans, power-of-two index math, and the mutable registry of gating
//! sequences a sequencer consults for wrap prevention.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::sequence::Sequence;

/// Minimum value over a set of sequences, bounded above by `minimum`
///
/// Returns `minimum` unchanged when the slice is empty. This is the
/// wrap-prevention primitive: producers pass their own position so an
/// empty gating set never reports more capacity than the cursor allows.
pub fn min_cursor_sequence(sequences: &[Arc<Sequence>], minimum: i64) -> i64 {
    sequences
        .iter()
        .map(|s| s.get())
        .fold(minimum, std::cmp::min)
}

/// Base-2 logarithm of a power-of-two value
///
/// Used to derive the index shift that converts a sequence into its
/// availability round. Callers must pass a power of two.
#[inline]
pub fn log2(value: usize) -> u32 {
    debug_assert!(value.is_power_of_two());
    value.trailing_zeros()
}

/// Registry of downstream consumer sequences that gate a producer
///
/// Reads vastly outnumber writes: the claim path only consults the group
/// when its cached gating value goes stale, while add/remove happen at
/// wiring time or during live topology changes. A read-write lock keeps
/// the scan cheap without an atomic-array dance.
#[derive(Default)]
pub struct SequenceGroup {
    sequences: RwLock<Vec<Arc<Sequence>>>,
}

impl SequenceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add gating sequences, bumping each to the current cursor position
    ///
    /// A sequence registered mid-flight would otherwise report -1 and
    /// stall the producer until its consumer catches up from the origin.
    pub fn add_all(&self, sequences: &[Arc<Sequence>], cursor: &Sequence) {
        let mut guard = self.sequences.write();
        for sequence in sequences {
            sequence.set(cursor.get());
            guard.push(Arc::clone(sequence));
        }
    }

    /// Remove a gating sequence by identity; returns true when found
    pub fn remove(&self, sequence: &Arc<Sequence>) -> bool {
        let mut guard = self.sequences.write();
        let before = guard.len();
        guard.retain(|s| !Arc::ptr_eq(s, sequence));
        guard.len() != before
    }

    /// Minimum over all members, bounded above by `minimum`
    pub fn minimum(&self, minimum: i64) -> i64 {
        min_cursor_sequence(&self.sequences.read(), minimum)
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.sequences.read().len()
    }
}
