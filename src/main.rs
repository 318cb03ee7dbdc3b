//! Throughput demonstration for the Surge sequencing engine
//!
//! Drives a single-producer and a multi-producer pipeline end to end and
//! reports the sustained event rates.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::Result;

use surge::constants::{DEMO_BATCH_SIZE, MESSAGES_PER_MILLION, NANOS_PER_SEC};
use surge::{
    BatchEventProcessor, DataProvider, EventHandler, HandlerError, RingBuffer,
    WaitStrategyFactory, WaitStrategyType,
};

const EVENTS_PER_RUN: usize = 10_000_000;
const BUFFER_SIZE: usize = 1 << 16;

struct CountingHandler {
    seen: u64,
    checksum: u64,
}

impl EventHandler<u64> for CountingHandler {
    fn on_event(&mut self, event: &u64, _sequence: i64, _end_of_batch: bool) -> Result<(), HandlerError> {
        self.seen += 1;
        self.checksum = self.checksum.wrapping_add(*event);
        Ok(())
    }

    fn on_shutdown(&mut self) -> Result<(), HandlerError> {
        tracing::info!(events = self.seen, checksum = self.checksum, "consumer done");
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("Surge - High-Performance Inter-Thread Messaging");
    println!("===============================================");
    println!("\nSystem Information:");
    println!("  CPU cores: {}", num_cpus::get());
    println!("  Buffer size: {} slots", BUFFER_SIZE);
    println!("  Events per run: {}", EVENTS_PER_RUN);

    println!("\nRunning single-producer pipeline...");
    let spsc = run_single_producer()?;
    println!(
        "  Single producer: {:.2} M events/sec",
        spsc / MESSAGES_PER_MILLION
    );

    let producers = num_cpus::get().clamp(2, 4) - 1;
    println!("\nRunning multi-producer pipeline ({producers} producers)...");
    let mpsc = run_multi_producer(producers)?;
    println!(
        "  Multi producer:  {:.2} M events/sec",
        mpsc / MESSAGES_PER_MILLION
    );

    Ok(())
}

fn run_single_producer() -> Result<f64> {
    let ring = Arc::new(RingBuffer::with_single_producer(
        || 0u64,
        BUFFER_SIZE,
        WaitStrategyFactory::create_strategy(WaitStrategyType::BusySpin),
    )?);

    let mut processor = BatchEventProcessor::new(
        ring.clone() as Arc<dyn DataProvider<u64>>,
        ring.new_barrier(&[]),
        CountingHandler {
            seen: 0,
            checksum: 0,
        },
    );
    ring.add_gating_sequences(&[processor.sequence()]);
    let halt = processor.halt_handle();
    let consumer = thread::spawn(move || processor.run());

    let timer = Instant::now();
    let mut published = 0usize;
    while published < EVENTS_PER_RUN {
        let batch = DEMO_BATCH_SIZE.min(EVENTS_PER_RUN - published);
        ring.publish_events(batch, |slot, sequence| {
            *slot = sequence as u64;
        })?;
        published += batch;
    }
    let elapsed = timer.elapsed().as_nanos() as f64;

    halt.halt();
    consumer
        .join()
        .expect("consumer thread panicked")
        .expect("consumer loop failed");

    Ok((EVENTS_PER_RUN as f64) / (elapsed / NANOS_PER_SEC))
}

fn run_multi_producer(producers: usize) -> Result<f64> {
    let ring = Arc::new(RingBuffer::with_multi_producer(
        || 0u64,
        BUFFER_SIZE,
        WaitStrategyFactory::create_strategy(WaitStrategyType::BusySpin),
    )?);

    let mut processor = BatchEventProcessor::new(
        ring.clone() as Arc<dyn DataProvider<u64>>,
        ring.new_barrier(&[]),
        CountingHandler {
            seen: 0,
            checksum: 0,
        },
    );
    ring.add_gating_sequences(&[processor.sequence()]);
    let halt = processor.halt_handle();
    let consumer = thread::spawn(move || processor.run());

    let per_producer = EVENTS_PER_RUN / producers;
    let timer = Instant::now();
    let mut handles = Vec::with_capacity(producers);
    for id in 0..producers {
        let ring = Arc::clone(&ring);
        handles.push(thread::spawn(move || {
            for _ in 0..per_producer {
                ring.publish_event(|slot, _| *slot = id as u64);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("producer thread panicked");
    }
    let elapsed = timer.elapsed().as_nanos() as f64;

    halt.halt();
    consumer
        .join()
        .expect("consumer thread panicked")
        .expect("consumer loop failed");

    Ok(((per_producer * producers) as f64) / (elapsed / NANOS_PER_SEC))
}
