//! Wait strategies for ring buffer consumers
//!
//! This module provides different wait strategies that control how
//! consumers wait for a target sequence to become available. Each strategy
//! offers a different trade-off between latency, CPU usage, and throughput.
//!
//! A strategy returns the highest sequence visible from the producer
//! cursor and the consumer's upstream dependencies once that value reaches
//! the requested target. Waits end early with `Alerted` when the owning
//! barrier is alerted, or with `TimedOut` for the deadline-bound variant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::utils::Backoff;
use parking_lot::{Condvar, Mutex};

use crate::constants::{
    DEFAULT_TIMEOUT_MICROS, SLEEPING_PARK_NANOS, SLEEPING_RETRIES, YIELDING_SPIN_TRIES,
};
use crate::error::{Result, SurgeError};
use crate::sequence::Sequence;
use crate::utils::min_cursor_sequence;

/// Trait for wait strategies that determine how consumers wait for data
pub trait WaitStrategy: Send + Sync {
    /// Wait until `sequence` is reachable from the cursor and every
    /// dependent sequence, returning the highest such sequence.
    ///
    /// Fails with `Alerted` if the alert flag is raised while waiting.
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64>;

    /// Signal that new data is available.
    ///
    /// No-op for strategies that never block; the blocking variants wake
    /// all parked waiters. Sequencers call this after every publish.
    fn signal_all_when_blocking(&self) {}
}

/// Highest sequence currently visible to a consumer: the slower of the
/// producer cursor and the slowest upstream dependency.
#[inline]
fn available_sequence(cursor: &Sequence, dependents: &[Arc<Sequence>]) -> i64 {
    min_cursor_sequence(dependents, cursor.get())
}

#[inline]
fn check_alert(alert: &AtomicBool) -> Result<()> {
    if alert.load(Ordering::Acquire) {
        return Err(SurgeError::Alerted);
    }
    Ok(())
}

/// Busy spin wait strategy - lowest latency, highest CPU usage
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BusySpinWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64> {
        loop {
            check_alert(alert)?;
            let available = available_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            std::hint::spin_loop();
        }
    }
}

/// Yielding wait strategy - spins briefly, then hands the CPU off
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    pub fn new() -> Self {
        Self {
            spin_tries: YIELDING_SPIN_TRIES,
        }
    }

    /// Create a yielding strategy with a custom spin count
    pub fn with_spin_tries(spin_tries: u32) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64> {
        let mut counter = 0u32;
        loop {
            check_alert(alert)?;
            let available = available_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            if counter < self.spin_tries {
                counter += 1;
                std::hint::spin_loop();
            } else {
                thread::yield_now();
            }
        }
    }
}

/// Sleeping wait strategy - lowest CPU usage, higher latency
///
/// Spins, then yields, then parks for a small fixed interval per
/// iteration. The park bounds worst-case wakeup latency at roughly the
/// OS timer resolution rather than the configured nanosecond value.
pub struct SleepingWaitStrategy {
    retries: u32,
    park_interval: Duration,
}

impl SleepingWaitStrategy {
    pub fn new() -> Self {
        Self::with_park_interval(Duration::from_nanos(SLEEPING_PARK_NANOS))
    }

    pub fn with_park_interval(park_interval: Duration) -> Self {
        Self {
            retries: SLEEPING_RETRIES,
            park_interval,
        }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64> {
        let mut counter = self.retries;
        loop {
            check_alert(alert)?;
            let available = available_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            if counter > self.retries / 2 {
                counter -= 1;
                std::hint::spin_loop();
            } else if counter > 0 {
                counter -= 1;
                thread::yield_now();
            } else {
                thread::sleep(self.park_interval);
            }
        }
    }
}

/// Blocking wait strategy - parks consumers on a condition variable
///
/// Lowest CPU usage while idle. The producer wakes all waiters via
/// `signal_all_when_blocking` on every publish; waiting on upstream
/// dependencies (which never signal) falls back to a short spin.
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }
}

impl Default for BlockingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64> {
        if cursor.get() < sequence {
            let mut guard = self.mutex.lock();
            while cursor.get() < sequence {
                check_alert(alert)?;
                self.condvar.wait(&mut guard);
            }
        }

        let backoff = Backoff::new();
        loop {
            check_alert(alert)?;
            let available = available_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            backoff.snooze();
        }
    }

    fn signal_all_when_blocking(&self) {
        // Taking the lock orders the wakeup after any in-flight cursor
        // check, so a waiter cannot park against an already-published
        // sequence and miss the notification.
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}

/// Timed blocking wait strategy - as blocking, but bounded by a deadline
///
/// A timeout is reported as `TimedOut`, which the batch event processor
/// converts into a handler notification rather than an error.
pub struct TimeoutBlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
    timeout: Duration,
}

impl TimeoutBlockingWaitStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
            timeout,
        }
    }
}

impl WaitStrategy for TimeoutBlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<i64> {
        let deadline = Instant::now() + self.timeout;

        if cursor.get() < sequence {
            let mut guard = self.mutex.lock();
            while cursor.get() < sequence {
                check_alert(alert)?;
                if self.condvar.wait_until(&mut guard, deadline).timed_out()
                    && cursor.get() < sequence
                {
                    return Err(SurgeError::TimedOut);
                }
            }
        }

        let backoff = Backoff::new();
        loop {
            check_alert(alert)?;
            let available = available_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            if Instant::now() >= deadline {
                return Err(SurgeError::TimedOut);
            }
            backoff.snooze();
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}

/// Available wait strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategyType {
    /// Busy spin for lowest latency
    BusySpin,
    /// Spin then yield for balanced latency and CPU usage
    Yielding,
    /// Spin, yield, then park for lowest CPU usage
    Sleeping,
    /// Park on a condition variable until the producer signals
    Blocking,
}

/// Factory for creating wait strategies
pub struct WaitStrategyFactory;

impl WaitStrategyFactory {
    /// Create a wait strategy from the given type
    pub fn create_strategy(strategy_type: WaitStrategyType) -> Arc<dyn WaitStrategy> {
        match strategy_type {
            WaitStrategyType::BusySpin => Arc::new(BusySpinWaitStrategy::new()),
            WaitStrategyType::Yielding => Arc::new(YieldingWaitStrategy::new()),
            WaitStrategyType::Sleeping => Arc::new(SleepingWaitStrategy::new()),
            WaitStrategyType::Blocking => Arc::new(BlockingWaitStrategy::new()),
        }
    }

    /// Create a timed blocking strategy with the given deadline
    pub fn timeout_blocking(timeout: Duration) -> Arc<dyn WaitStrategy> {
        Arc::new(TimeoutBlockingWaitStrategy::new(timeout))
    }

    /// Create a timed blocking strategy with the default deadline
    pub fn timeout_blocking_default() -> Arc<dyn WaitStrategy> {
        Self::timeout_blocking(Duration::from_micros(DEFAULT_TIMEOUT_MICROS))
    }

    /// Create a high-performance strategy optimized for low latency
    pub fn low_latency() -> Arc<dyn WaitStrategy> {
        Arc::new(BusySpinWaitStrategy::new())
    }

    /// Create a balanced strategy for moderate latency and CPU usage
    pub fn balanced() -> Arc<dyn WaitStrategy> {
        Arc::new(YieldingWaitStrategy::new())
    }

    /// Create a low-CPU strategy for background processing
    pub fn low_cpu() -> Arc<dyn WaitStrategy> {
        Arc::new(BlockingWaitStrategy::new())
    }
}
