//! Batch event processor: the long-running consumer loop
//!
//! A processor owns one consumer sequence and drives one handler from a
//! sequence barrier. Each pass waits for the next sequence, drains every
//! event up to the highest available one in a single batch (amortizing
//! the cross-thread synchronization), then release-publishes its own
//! sequence, which in turn gates the producers.
//!
//! Handler faults never escape the loop: they are routed to the
//! configured exception handler and the faulting sequence is skipped, so
//! a persistently bad slot cannot stall the pipeline.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::barrier::SequenceBarrier;
use crate::error::{Result, SurgeError};
use crate::event::{DataProvider, EventHandler, ExceptionHandler, LoggingExceptionHandler};
use crate::sequence::Sequence;

const IDLE: u8 = 0;
const HALTED: u8 = 1;
const RUNNING: u8 = 2;

/// Cloneable handle for halting a processor from any thread
#[derive(Clone)]
pub struct HaltHandle {
    running: Arc<AtomicU8>,
    barrier: Arc<SequenceBarrier>,
}

impl HaltHandle {
    /// Request shutdown: the processor finishes its current event, runs
    /// the shutdown lifecycle, and returns from `run`. Idempotent.
    pub fn halt(&self) {
        self.running.store(HALTED, Ordering::SeqCst);
        self.barrier.alert();
    }

    /// Whether the processor has entered `run` and not yet returned
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) != IDLE
    }
}

/// Drives an [`EventHandler`] from a [`SequenceBarrier`] in batches
pub struct BatchEventProcessor<E, H: EventHandler<E>> {
    data_provider: Arc<dyn DataProvider<E>>,
    barrier: Arc<SequenceBarrier>,
    handler: H,
    sequence: Arc<Sequence>,
    running: Arc<AtomicU8>,
    exception_handler: Box<dyn ExceptionHandler<E>>,
}

impl<E, H: EventHandler<E>> BatchEventProcessor<E, H> {
    /// Create a processor over `barrier`, reading events from
    /// `data_provider` and dispatching to `handler`.
    ///
    /// The handler immediately receives the processor's sequence through
    /// its `set_sequence_callback` capability; handlers that do not care
    /// inherit the no-op default.
    pub fn new(
        data_provider: Arc<dyn DataProvider<E>>,
        barrier: SequenceBarrier,
        mut handler: H,
    ) -> Self {
        let sequence = Arc::new(Sequence::default());
        handler.set_sequence_callback(Arc::clone(&sequence));
        Self {
            data_provider,
            barrier: Arc::new(barrier),
            handler,
            sequence,
            running: Arc::new(AtomicU8::new(IDLE)),
            exception_handler: Box::new(LoggingExceptionHandler::new()),
        }
    }

    /// The processor's consumer sequence, to be registered as a gating
    /// sequence on the upstream sequencer
    pub fn sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.sequence)
    }

    /// Replace the exception handler (default: log and continue)
    pub fn set_exception_handler(&mut self, exception_handler: Box<dyn ExceptionHandler<E>>) {
        self.exception_handler = exception_handler;
    }

    /// Handle for halting this processor from another thread
    pub fn halt_handle(&self) -> HaltHandle {
        HaltHandle {
            running: Arc::clone(&self.running),
            barrier: Arc::clone(&self.barrier),
        }
    }

    /// Request shutdown (same as `halt_handle().halt()`)
    pub fn halt(&self) {
        self.running.store(HALTED, Ordering::SeqCst);
        self.barrier.alert();
    }

    /// Whether `run` is currently executing (or halt is pending)
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) != IDLE
    }

    /// Run the processing loop on the calling thread until halted.
    ///
    /// Fails with an illegal-state error when the processor is already
    /// running on another thread. A processor halted before `run` still
    /// emits its start and shutdown lifecycle notifications, then
    /// returns without processing.
    pub fn run(&mut self) -> Result<()> {
        match self
            .running
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {
                tracing::debug!("event processor starting");
                self.barrier.clear_alert();
                self.notify_start();
                if self.running.load(Ordering::SeqCst) == RUNNING {
                    self.process_events();
                }
                self.notify_shutdown();
                self.running.store(IDLE, Ordering::SeqCst);
                tracing::debug!("event processor stopped");
                Ok(())
            }
            Err(HALTED) => {
                // Halted before it ever ran: lifecycle still fires once.
                self.notify_start();
                self.notify_shutdown();
                self.running.store(IDLE, Ordering::SeqCst);
                Ok(())
            }
            Err(_) => Err(SurgeError::illegal_state(
                "processor is already running on another thread",
            )),
        }
    }

    fn process_events(&mut self) {
        let data_provider = Arc::clone(&self.data_provider);
        let mut next_sequence = self.sequence.get() + 1;

        loop {
            match self.barrier.wait_for(next_sequence) {
                Ok(available_sequence) => {
                    if next_sequence <= available_sequence {
                        let batch_size = available_sequence - next_sequence + 1;
                        if let Err(error) = self.handler.on_batch_start(batch_size) {
                            let event = data_provider.get(next_sequence);
                            self.exception_handler.handle_event_error(
                                error,
                                next_sequence,
                                Some(event),
                            );
                            self.sequence.set(next_sequence);
                            next_sequence += 1;
                            continue;
                        }
                    }

                    let mut faulted = false;
                    while next_sequence <= available_sequence {
                        let event = data_provider.get(next_sequence);
                        let end_of_batch = next_sequence == available_sequence;
                        if let Err(error) =
                            self.handler.on_event(event, next_sequence, end_of_batch)
                        {
                            // Skip the faulting sequence so gating keeps
                            // advancing; the rest of the batch is redrawn
                            // from the barrier.
                            self.exception_handler.handle_event_error(
                                error,
                                next_sequence,
                                Some(event),
                            );
                            self.sequence.set(next_sequence);
                            next_sequence += 1;
                            faulted = true;
                            break;
                        }
                        next_sequence += 1;
                    }
                    if !faulted {
                        self.sequence.set(available_sequence);
                    }
                }
                Err(SurgeError::Alerted) => {
                    if self.running.load(Ordering::SeqCst) != RUNNING {
                        break;
                    }
                }
                Err(SurgeError::TimedOut) => {
                    self.notify_timeout(self.sequence.get());
                }
                Err(_) => break,
            }
        }
    }

    fn notify_timeout(&mut self, sequence: i64) {
        if let Err(error) = self.handler.on_timeout(sequence) {
            self.exception_handler
                .handle_event_error(error, sequence, None);
        }
    }

    fn notify_start(&mut self) {
        if let Err(error) = self.handler.on_start() {
            self.exception_handler.handle_start_error(error);
        }
    }

    fn notify_shutdown(&mut self) {
        if let Err(error) = self.handler.on_shutdown() {
            self.exception_handler.handle_shutdown_error(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::HandlerError;
    use crate::ring_buffer::RingBuffer;
    use crate::wait_strategy::BusySpinWaitStrategy;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    struct RecordingHandler {
        events: mpsc::Sender<(u64, i64, bool)>,
    }

    impl EventHandler<u64> for RecordingHandler {
        fn on_event(
            &mut self,
            event: &u64,
            sequence: i64,
            end_of_batch: bool,
        ) -> std::result::Result<(), HandlerError> {
            self.events.send((*event, sequence, end_of_batch)).unwrap();
            Ok(())
        }
    }

    fn ring(size: usize) -> Arc<RingBuffer<u64>> {
        Arc::new(
            RingBuffer::with_single_producer(|| 0u64, size, Arc::new(BusySpinWaitStrategy::new()))
                .unwrap(),
        )
    }

    #[test]
    fn test_processor_drains_published_events() {
        let ring = ring(16);
        let (tx, rx) = mpsc::channel();
        let mut processor = BatchEventProcessor::new(
            ring.clone() as Arc<dyn DataProvider<u64>>,
            ring.new_barrier(&[]),
            RecordingHandler { events: tx },
        );
        ring.add_gating_sequences(&[processor.sequence()]);
        let halt = processor.halt_handle();

        let consumer = thread::spawn(move || processor.run());

        for value in 0..8u64 {
            ring.publish_event(|slot, _| *slot = value * 3);
        }

        let mut received = Vec::new();
        for _ in 0..8 {
            received.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        }
        halt.halt();
        consumer.join().unwrap().unwrap();

        for (i, (value, sequence, _)) in received.iter().enumerate() {
            assert_eq!(*sequence, i as i64);
            assert_eq!(*value, i as u64 * 3);
        }
    }

    #[test]
    fn test_run_while_running_is_illegal_state() {
        let ring = ring(8);
        let (tx, _rx) = mpsc::channel();
        let mut processor = BatchEventProcessor::new(
            ring.clone() as Arc<dyn DataProvider<u64>>,
            ring.new_barrier(&[]),
            RecordingHandler { events: tx },
        );

        processor.running.store(RUNNING, Ordering::SeqCst);
        assert!(matches!(
            processor.run(),
            Err(SurgeError::IllegalState { .. })
        ));
        // The rejected call must not have clobbered the state.
        assert_eq!(processor.running.load(Ordering::SeqCst), RUNNING);
        processor.running.store(IDLE, Ordering::SeqCst);
    }

    #[test]
    fn test_halt_before_run_emits_lifecycle_only() {
        struct LifecycleHandler {
            started: mpsc::Sender<&'static str>,
        }
        impl EventHandler<u64> for LifecycleHandler {
            fn on_event(
                &mut self,
                _: &u64,
                _: i64,
                _: bool,
            ) -> std::result::Result<(), HandlerError> {
                self.started.send("event").unwrap();
                Ok(())
            }
            fn on_start(&mut self) -> std::result::Result<(), HandlerError> {
                self.started.send("start").unwrap();
                Ok(())
            }
            fn on_shutdown(&mut self) -> std::result::Result<(), HandlerError> {
                self.started.send("shutdown").unwrap();
                Ok(())
            }
        }

        let ring = ring(8);
        let (tx, rx) = mpsc::channel();
        let mut processor = BatchEventProcessor::new(
            ring.clone() as Arc<dyn DataProvider<u64>>,
            ring.new_barrier(&[]),
            LifecycleHandler { started: tx },
        );
        ring.add_gating_sequences(&[processor.sequence()]);
        ring.publish_event(|slot, _| *slot = 1);

        processor.halt();
        processor.run().unwrap();

        assert_eq!(rx.try_recv().unwrap(), "start");
        assert_eq!(rx.try_recv().unwrap(), "shutdown");
        assert!(rx.try_recv().is_err());
        assert!(!processor.is_running());
    }
}
