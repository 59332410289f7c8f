//! Durable step-result journal.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::bus::RuntimeError;

/// Persists each step's result keyed by (invocation, step).
///
/// The journal is what makes retries cheap: a re-run invocation replays
/// journaled results instead of re-executing their steps. Only successful
/// results are stored.
#[async_trait]
pub trait StepJournal: Send + Sync {
    /// Load a previously journaled step result.
    async fn load(
        &self,
        invocation: &str,
        step: &str,
    ) -> Result<Option<serde_json::Value>, RuntimeError>;

    /// Store a step result. Overwrites any prior value for the same key.
    async fn store(
        &self,
        invocation: &str,
        step: &str,
        value: serde_json::Value,
    ) -> Result<(), RuntimeError>;
}

/// In-process journal. Durable for the lifetime of the process, which
/// matches the in-process bus it ships with; a deployment wanting
/// crash-durable replays backs this trait with a table instead.
#[derive(Default)]
pub struct MemoryJournal {
    entries: RwLock<HashMap<(String, String), serde_json::Value>>,
}

impl MemoryJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StepJournal for MemoryJournal {
    async fn load(
        &self,
        invocation: &str,
        step: &str,
    ) -> Result<Option<serde_json::Value>, RuntimeError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(invocation.to_string(), step.to_string()))
            .cloned())
    }

    async fn store(
        &self,
        invocation: &str,
        step: &str,
        value: serde_json::Value,
    ) -> Result<(), RuntimeError> {
        self.entries
            .write()
            .await
            .insert((invocation.to_string(), step.to_string()), value);
        Ok(())
    }
}
