//! Surge - High-performance inter-thread messaging library
//!
//! Surge delivers ordered events from producer threads to consumer
//! threads through a preallocated ring buffer with explicit sequence
//! coordination: no allocation on the hot path, no locks on contended
//! paths, and bounded backpressure enforced by sequence gating.
//!
//! ## Key Features
//!
//! - **Pre-allocated Ring**: every slot is constructed once, up front
//! - **Lock-Free Claims**: CAS-ordered multi-producer claims; plain-cell
//!   single-producer fast path
//! - **Cache-Friendly**: sequence counters padded across line pairs to
//!   prevent false sharing
//! - **Batching**: consumers drain every available event per wakeup
//! - **Wait Strategies**: busy-spin, yielding, sleeping, blocking, and
//!   deadline-bound blocking trade latency against CPU
//! - **Fault Isolation**: handler errors route to an exception handler;
//!   the pipeline keeps moving
//!
//! ## Architecture
//!
//! Producers claim sequences from a [`Sequencer`], write the slots, then
//! publish. A consumer's [`SequenceBarrier`] waits (via the configured
//! [`WaitStrategy`]) until a target sequence is reachable from the
//! producer cursor and any upstream consumers, and the
//! [`BatchEventProcessor`] dispatches every available event to its
//! handler before updating its own [`Sequence`] - which in turn gates the
//! producers. Dependent consumers form a DAG with the producer as the
//! ultimate source.
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use surge::{
//!     BatchEventProcessor, DataProvider, EventHandler, HandlerError, RingBuffer,
//!     WaitStrategyFactory, WaitStrategyType,
//! };
//!
//! struct Printer;
//!
//! impl EventHandler<u64> for Printer {
//!     fn on_event(&mut self, event: &u64, sequence: i64, _: bool) -> Result<(), HandlerError> {
//!         println!("sequence {sequence}: {event}");
//!         Ok(())
//!     }
//! }
//!
//! let ring = Arc::new(RingBuffer::with_single_producer(
//!     || 0u64,
//!     1024,
//!     WaitStrategyFactory::create_strategy(WaitStrategyType::Blocking),
//! ).unwrap());
//!
//! let mut processor = BatchEventProcessor::new(
//!     ring.clone() as Arc<dyn DataProvider<u64>>,
//!     ring.new_barrier(&[]),
//!     Printer,
//! );
//! ring.add_gating_sequences(&[processor.sequence()]);
//!
//! let halt = processor.halt_handle();
//! let consumer = thread::spawn(move || processor.run());
//!
//! for value in 0..4u64 {
//!     ring.publish_event(|slot, _| *slot = value * value);
//! }
//!
//! halt.halt();
//! consumer.join().unwrap().unwrap();
//! ```

pub mod barrier;
pub mod constants;
pub mod error;
pub mod event;
pub mod poller;
pub mod processor;
pub mod ring_buffer;
pub mod sequence;
pub mod sequencer;
pub mod utils;
pub mod wait_strategy;

// Re-export main components
pub use barrier::SequenceBarrier;
pub use error::{Result, SurgeError};
pub use event::{
    DataProvider, EventFactory, EventHandler, ExceptionHandler, HandlerError,
    LoggingExceptionHandler,
};
pub use poller::{EventPoller, PollState};
pub use processor::{BatchEventProcessor, HaltHandle};
pub use ring_buffer::RingBuffer;
pub use sequence::Sequence;
pub use sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy,
    TimeoutBlockingWaitStrategy, WaitStrategy, WaitStrategyFactory, WaitStrategyType,
    YieldingWaitStrategy,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
