//! Event bus and step-function runtime.
//!
//! Reproduces the contract of a managed step-function service: handlers
//! register against a named event or cron expression, each handler runs a
//! sequence of named steps, and every step's result is journaled before
//! the next step starts, so a retried invocation resumes after its last
//! completed step instead of redoing work.

mod bus;
mod journal;

pub use bus::{
    EventBus, EventSink, Handler, IngestOutcome, InvocationOutcome, RetryPolicy, RuntimeError,
    StepContext, Trigger,
};
pub use journal::{MemoryJournal, StepJournal};
