//! Property tests for the core sequencing invariants
//!
//! Checks payload integrity, gap-free delivery, wrap prevention, and the
//! multi-producer contiguous-prefix guarantee over generated workloads.

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use proptest::collection::vec;
use proptest::prelude::*;

use surge::{
    BatchEventProcessor, DataProvider, EventHandler, HandlerError, RingBuffer, Sequence,
    SingleProducerSequencer, Sequencer, SurgeError, WaitStrategyFactory, WaitStrategyType,
};

struct ForwardingHandler {
    out: mpsc::Sender<(i64, u64)>,
}

impl EventHandler<u64> for ForwardingHandler {
    fn on_event(&mut self, event: &u64, sequence: i64, _: bool) -> Result<(), HandlerError> {
        self.out.send((sequence, *event)).unwrap();
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every published payload arrives exactly once, in publish order,
    /// with sequence numbers counting up from zero.
    #[test]
    fn prop_spsc_payload_integrity(payloads in vec(any::<u64>(), 1..512)) {
        let ring = Arc::new(
            RingBuffer::with_single_producer(
                || 0u64,
                64,
                WaitStrategyFactory::create_strategy(WaitStrategyType::BusySpin),
            )
            .unwrap(),
        );
        let (tx, rx) = mpsc::channel();
        let mut processor = BatchEventProcessor::new(
            ring.clone() as Arc<dyn DataProvider<u64>>,
            ring.new_barrier(&[]),
            ForwardingHandler { out: tx },
        );
        ring.add_gating_sequences(&[processor.sequence()]);
        let halt = processor.halt_handle();
        let consumer = thread::spawn(move || processor.run());

        for payload in &payloads {
            let value = *payload;
            ring.publish_event(move |slot, _| *slot = value);
        }

        for (i, payload) in payloads.iter().enumerate() {
            let (sequence, value) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
            prop_assert_eq!(sequence, i as i64);
            prop_assert_eq!(value, *payload);
        }

        halt.halt();
        consumer.join().unwrap().unwrap();
        prop_assert!(rx.try_recv().is_err());
    }

    /// Wrap prevention: under any interleaving of producer claims and
    /// consumer advances, the cursor never runs more than one ring ahead
    /// of the slowest gating sequence, and claims that would violate the
    /// bound fail with the capacity sentinel.
    #[test]
    fn prop_wrap_prevention(steps in vec((1usize..4, 0i64..4), 1..256)) {
        const SIZE: usize = 16;
        let sequencer = SingleProducerSequencer::new(
            SIZE,
            WaitStrategyFactory::create_strategy(WaitStrategyType::BusySpin),
        )
        .unwrap();
        let consumer = Arc::new(Sequence::default());
        sequencer.add_gating_sequences(std::slice::from_ref(&consumer));

        let mut claimed: i64 = -1;
        let mut consumed: i64 = -1;

        for (claim, advance) in steps {
            match sequencer.try_next_n(claim) {
                Ok(high) => {
                    sequencer.publish_range(high - claim as i64 + 1, high);
                    claimed = high;
                }
                Err(SurgeError::InsufficientCapacity) => {
                    // The claim must genuinely have been over capacity.
                    prop_assert!(claimed + claim as i64 - consumed > SIZE as i64);
                }
                Err(other) => return Err(TestCaseError::fail(other.to_string())),
            }

            prop_assert!(claimed - consumed <= SIZE as i64);

            consumed = (consumed + advance).min(claimed);
            consumer.set(consumed);

            let remaining = sequencer.remaining_capacity();
            prop_assert_eq!(remaining, SIZE as i64 - (claimed - consumed));
        }
    }

    /// Multi-producer delivery: the consumer observes a gap-free prefix
    /// containing every published event exactly once, and each producer's
    /// events in its own publish order.
    #[test]
    fn prop_multi_producer_contiguous_prefix(
        producer_counts in vec(1u64..200, 1..4),
    ) {
        let ring = Arc::new(
            RingBuffer::with_multi_producer(
                || 0u64,
                128,
                WaitStrategyFactory::create_strategy(WaitStrategyType::BusySpin),
            )
            .unwrap(),
        );
        let (tx, rx) = mpsc::channel();
        let mut processor = BatchEventProcessor::new(
            ring.clone() as Arc<dyn DataProvider<u64>>,
            ring.new_barrier(&[]),
            ForwardingHandler { out: tx },
        );
        ring.add_gating_sequences(&[processor.sequence()]);
        let halt = processor.halt_handle();
        let consumer = thread::spawn(move || processor.run());

        let mut producers = Vec::new();
        for (id, count) in producer_counts.iter().enumerate() {
            let ring = Arc::clone(&ring);
            let count = *count;
            producers.push(thread::spawn(move || {
                for n in 0..count {
                    // Encode producer id and per-producer index so order
                    // within each producer is checkable downstream.
                    let tagged = ((id as u64) << 32) | n;
                    ring.publish_event(move |slot, _| *slot = tagged);
                }
            }));
        }
        for producer in producers {
            producer.join().unwrap();
        }

        let total: u64 = producer_counts.iter().sum();
        let mut next_per_producer = vec![0u64; producer_counts.len()];
        for expected_sequence in 0..total {
            let (sequence, tagged) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
            prop_assert_eq!(sequence, expected_sequence as i64);

            let id = (tagged >> 32) as usize;
            let n = tagged & 0xFFFF_FFFF;
            prop_assert_eq!(n, next_per_producer[id]);
            next_per_producer[id] += 1;
        }

        halt.halt();
        consumer.join().unwrap().unwrap();
        prop_assert_eq!(next_per_producer, producer_counts);
    }
}
