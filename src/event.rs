//! Event-side interfaces: factories, handlers, and fault routing
//!
//! User code plugs into the pipeline through the traits in this module.
//! Optional handler capabilities (lifecycle, batch observation, timeout
//! notification, sequence callback) are default trait methods rather than
//! marker interfaces, so a handler opts in by overriding exactly the
//! hooks it cares about and the processor never needs runtime type tests.

use std::sync::Arc;

use crate::sequence::Sequence;

/// Error type surfaced by user handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Constructs the pre-allocated value for every ring buffer slot
pub trait EventFactory<E> {
    fn new_instance(&self) -> E;
}

impl<E, F> EventFactory<E> for F
where
    F: Fn() -> E,
{
    fn new_instance(&self) -> E {
        self()
    }
}

/// Read access to published slots; the ring buffer is the canonical
/// implementation, test fixtures may supply others
pub trait DataProvider<E>: Send + Sync {
    /// Borrow the slot for `sequence`.
    ///
    /// Callers must only pass sequences a barrier or sequencer has
    /// reported as available.
    fn get(&self, sequence: i64) -> &E;
}

/// Callback invoked for each event a processor drains
///
/// `end_of_batch` is true for exactly the last event of a drained batch,
/// letting the handler flush or commit amortized work.
pub trait EventHandler<E>: Send {
    fn on_event(
        &mut self,
        event: &E,
        sequence: i64,
        end_of_batch: bool,
    ) -> Result<(), HandlerError>;

    /// Lifecycle: called once before the first event of a run
    fn on_start(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Lifecycle: called once after the last event of a run
    fn on_shutdown(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Called at the start of each drain with the batch size
    fn on_batch_start(&mut self, _batch_size: i64) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Called when a deadline-bound wait strategy times out; `sequence`
    /// is the processor's current position
    fn on_timeout(&mut self, _sequence: i64) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Receives the processor's own sequence at construction so the
    /// handler can publish mid-batch progress and unblock producers early
    fn set_sequence_callback(&mut self, _sequence: Arc<Sequence>) {}
}

/// Sink for faults raised by an [`EventHandler`]
///
/// Isolates the processing loop from handler faults; without it a single
/// bad event would kill the consumer thread and stall the pipeline.
pub trait ExceptionHandler<E>: Send {
    /// A dispatch or timeout hook failed. `event` is `None` only for
    /// timeout notifications, which carry no payload.
    fn handle_event_error(&mut self, error: HandlerError, sequence: i64, event: Option<&E>);

    /// The handler's start lifecycle hook failed
    fn handle_start_error(&mut self, error: HandlerError);

    /// The handler's shutdown lifecycle hook failed
    fn handle_shutdown_error(&mut self, error: HandlerError);
}

/// Default exception handler: logs the fault and swallows it so the
/// processor keeps draining
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingExceptionHandler;

impl LoggingExceptionHandler {
    pub fn new() -> Self {
        Self
    }
}

impl<E> ExceptionHandler<E> for LoggingExceptionHandler {
    fn handle_event_error(&mut self, error: HandlerError, sequence: i64, _event: Option<&E>) {
        tracing::error!(sequence, %error, "handler fault while processing event");
    }

    fn handle_start_error(&mut self, error: HandlerError) {
        tracing::error!(%error, "handler fault during start");
    }

    fn handle_shutdown_error(&mut self, error: HandlerError) {
        tracing::error!(%error, "handler fault during shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_event_factory() {
        let factory = || 7u64;
        assert_eq!(factory.new_instance(), 7);
    }

    #[test]
    fn test_default_capabilities_are_no_ops() {
        struct Minimal;
        impl EventHandler<u64> for Minimal {
            fn on_event(&mut self, _: &u64, _: i64, _: bool) -> Result<(), HandlerError> {
                Ok(())
            }
        }

        let mut handler = Minimal;
        assert!(handler.on_start().is_ok());
        assert!(handler.on_shutdown().is_ok());
        assert!(handler.on_batch_start(3).is_ok());
        assert!(handler.on_timeout(-1).is_ok());
        handler.set_sequence_callback(Arc::new(Sequence::default()));
    }

    #[test]
    fn test_logging_exception_handler_swallows() {
        let mut handler = LoggingExceptionHandler::new();
        ExceptionHandler::<u64>::handle_event_error(&mut handler, "boom".into(), 5, Some(&1));
        ExceptionHandler::<u64>::handle_start_error(&mut handler, "boom".into());
        ExceptionHandler::<u64>::handle_shutdown_error(&mut handler, "boom".into());
    }
}
