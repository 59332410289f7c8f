//! Handler registry, step context, and the in-process event bus.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use repcoach_core::{CoachEvent, EventDecodeError, EventKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use ulid::Ulid;

use crate::journal::StepJournal;

/// Error type for runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Journal read/write failure.
    #[error("journal error: {0}")]
    Journal(String),

    /// A step result could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A handler step failed.
    #[error("handler error: {0}")]
    Handler(String),

    /// The bus receiver is gone.
    #[error("event bus is closed")]
    BusClosed,

    /// `run_cron` was called with an unregistered handler id.
    #[error("no handler registered with id `{0}`")]
    UnknownHandler(String),
}

impl RuntimeError {
    /// Wrap any displayable error as a handler failure.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        Self::Handler(err.to_string())
    }
}

/// What causes a handler to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Invoke on every event of this kind.
    Event(EventKind),
    /// Invoke on a schedule. The expression is carried as metadata for the
    /// host scheduler; the bus itself fires crons only on demand via
    /// [`EventBus::run_cron`].
    Cron(&'static str),
}

/// An event handler registered on the bus.
///
/// `handle` receives the triggering event (`None` for cron invocations)
/// and a [`StepContext`] whose `run` executes each named step exactly once
/// per invocation.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Stable handler id, also the journal's invocation prefix.
    fn id(&self) -> &'static str;

    /// What invokes this handler.
    fn trigger(&self) -> Trigger;

    /// Run the handler's steps.
    async fn handle(
        &self,
        ctx: &StepContext,
        event: Option<&CoachEvent>,
    ) -> Result<serde_json::Value, RuntimeError>;
}

/// Handle for emitting events onto the bus from inside a handler.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSink {
    /// Enqueue an event for dispatch.
    pub fn send(&self, event: CoachEvent) -> Result<(), RuntimeError> {
        self.tx
            .send(Envelope {
                id: Ulid::new(),
                event,
            })
            .map_err(|_| RuntimeError::BusClosed)
    }
}

struct Envelope {
    id: Ulid,
    event: CoachEvent,
}

/// Per-invocation step executor handed to handlers.
pub struct StepContext {
    invocation: String,
    journal: Arc<dyn StepJournal>,
    sink: EventSink,
}

impl StepContext {
    /// Execute a named step exactly once per invocation.
    ///
    /// If the journal already holds a result for this (invocation, step),
    /// it is replayed without running `f`. Otherwise `f` runs and its
    /// result is journaled before this call returns, so a later retry of
    /// the invocation resumes after this step.
    pub async fn run<T, F, Fut>(&self, step: &str, f: F) -> Result<T, RuntimeError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RuntimeError>> + Send,
    {
        if let Some(cached) = self.journal.load(&self.invocation, step).await? {
            tracing::debug!(invocation = %self.invocation, step, "replaying journaled step");
            return Ok(serde_json::from_value(cached)?);
        }

        let output = f().await?;
        self.journal
            .store(&self.invocation, step, serde_json::to_value(&output)?)
            .await?;
        Ok(output)
    }

    /// Sink for emitting further events.
    pub fn events(&self) -> &EventSink {
        &self.sink
    }

    /// Id of the current invocation.
    pub fn invocation(&self) -> &str {
        &self.invocation
    }
}

/// Retry behavior for failed handler invocations.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per invocation, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per further attempt.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
        }
    }
}

/// Result of one handler invocation after retries.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    /// Handler that ran.
    pub handler: String,
    /// Invocation id used for journaling.
    pub invocation: String,
    /// Attempts consumed.
    pub attempts: u32,
    /// Handler return value, when it succeeded.
    pub output: Option<serde_json::Value>,
    /// Final error, when every attempt failed.
    pub error: Option<String>,
}

impl InvocationOutcome {
    /// Whether the invocation ultimately succeeded.
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of ingesting an external `(name, payload)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The event decoded and was enqueued.
    Accepted,
    /// The event was rejected at the boundary; nothing was enqueued.
    Rejected {
        /// Machine-readable rejection reason.
        reason: String,
    },
}

/// In-process at-least-once event bus.
///
/// Events enqueue through an [`EventSink`]; `drain` dispatches until the
/// queue is empty, invoking every handler registered for each event's kind
/// and retrying failures per the [`RetryPolicy`]. Handlers may emit
/// further events mid-drain; they are processed in the same pass.
pub struct EventBus {
    handlers: Vec<Arc<dyn Handler>>,
    journal: Arc<dyn StepJournal>,
    retry: RetryPolicy,
    tx: mpsc::UnboundedSender<Envelope>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

impl EventBus {
    /// Create a bus over the given journal.
    pub fn new(journal: Arc<dyn StepJournal>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handlers: Vec::new(),
            journal,
            retry: RetryPolicy::default(),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register a handler.
    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        tracing::debug!(handler = handler.id(), "registered handler");
        self.handlers.push(handler);
    }

    /// Sink for emitting events onto this bus.
    pub fn sink(&self) -> EventSink {
        EventSink {
            tx: self.tx.clone(),
        }
    }

    /// Enqueue a typed event.
    pub fn emit(&self, event: CoachEvent) -> Result<(), RuntimeError> {
        self.sink().send(event)
    }

    /// Decode and enqueue an external `(name, payload)` pair.
    ///
    /// Unknown event names and unknown recommendation types are rejected
    /// here, with one warning each, so handlers never see them.
    pub fn ingest(&self, name: &str, data: serde_json::Value) -> IngestOutcome {
        match CoachEvent::decode(name, data) {
            Ok(event) => match self.emit(event) {
                Ok(()) => IngestOutcome::Accepted,
                Err(_) => IngestOutcome::Rejected {
                    reason: "bus_closed".to_string(),
                },
            },
            Err(EventDecodeError::UnknownRecommendationType(raw)) => {
                tracing::warn!(recommendation_type = %raw, "unknown recommendation type");
                IngestOutcome::Rejected {
                    reason: "unknown_recommendation_type".to_string(),
                }
            }
            Err(EventDecodeError::UnknownEvent(name)) => {
                tracing::warn!(event = %name, "unknown event name");
                IngestOutcome::Rejected {
                    reason: "unknown_event".to_string(),
                }
            }
            Err(EventDecodeError::Payload(err)) => {
                tracing::warn!(event = name, error = %err, "malformed event payload");
                IngestOutcome::Rejected {
                    reason: "invalid_payload".to_string(),
                }
            }
        }
    }

    /// Dispatch queued events until the queue is empty.
    pub async fn drain(&self) -> Vec<InvocationOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let envelope = {
                let mut rx = self.rx.lock().await;
                match rx.try_recv() {
                    Ok(envelope) => envelope,
                    Err(_) => break,
                }
            };
            outcomes.extend(self.dispatch(&envelope).await);
        }
        outcomes
    }

    /// Fire a cron handler by id. Events it emits stay queued until the
    /// next `drain`.
    pub async fn run_cron(&self, id: &str) -> Result<InvocationOutcome, RuntimeError> {
        let handler = self
            .handlers
            .iter()
            .find(|h| h.id() == id && matches!(h.trigger(), Trigger::Cron(_)))
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownHandler(id.to_string()))?;

        let invocation = format!("{}:{}", handler.id(), Ulid::new());
        Ok(self.invoke(&handler, invocation, None).await)
    }

    /// Registered cron handlers as (id, schedule) pairs.
    pub fn cron_schedule(&self) -> Vec<(&'static str, &'static str)> {
        self.handlers
            .iter()
            .filter_map(|h| match h.trigger() {
                Trigger::Cron(expr) => Some((h.id(), expr)),
                Trigger::Event(_) => None,
            })
            .collect()
    }

    async fn dispatch(&self, envelope: &Envelope) -> Vec<InvocationOutcome> {
        let kind = envelope.event.kind();
        let subscribers: Vec<Arc<dyn Handler>> = self
            .handlers
            .iter()
            .filter(|h| h.trigger() == Trigger::Event(kind))
            .cloned()
            .collect();

        if subscribers.is_empty() {
            tracing::debug!(event = %kind, "no handler subscribed");
            return Vec::new();
        }

        let mut outcomes = Vec::new();
        for handler in subscribers {
            let invocation = format!("{}:{}", handler.id(), envelope.id);
            outcomes.push(self.invoke(&handler, invocation, Some(&envelope.event)).await);
        }
        outcomes
    }

    async fn invoke(
        &self,
        handler: &Arc<dyn Handler>,
        invocation: String,
        event: Option<&CoachEvent>,
    ) -> InvocationOutcome {
        let ctx = StepContext {
            invocation: invocation.clone(),
            journal: self.journal.clone(),
            sink: self.sink(),
        };

        let mut attempts = 0u32;
        let mut last_error = None;

        while attempts < self.retry.max_attempts {
            attempts += 1;
            match handler.handle(&ctx, event).await {
                Ok(output) => {
                    return InvocationOutcome {
                        handler: handler.id().to_string(),
                        invocation,
                        attempts,
                        output: Some(output),
                        error: None,
                    };
                }
                Err(err) => {
                    tracing::warn!(
                        handler = handler.id(),
                        attempt = attempts,
                        error = %err,
                        "handler invocation failed"
                    );
                    last_error = Some(err.to_string());
                    if attempts < self.retry.max_attempts {
                        let backoff = self.retry.base_backoff * 2u32.saturating_pow(attempts - 1);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        InvocationOutcome {
            handler: handler.id().to_string(),
            invocation,
            attempts,
            output: None,
            error: last_error,
        }
    }
}
