//! Definition and invocation records, and the sinks that receive them.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::Error;

/// The one-time record describing a tracked program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionRecord {
    pub identity_hash: String,
    pub qualified_name: String,
    pub source_text: String,
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub is_lmp: bool,
    /// Decoration-time provider parameters, for language-model programs bound with any.
    pub lm_params: Option<Value>,
    /// Identity hashes of the programs this one calls.
    pub uses: BTreeSet<String>,
}

/// The record of a single call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub id: Uuid,
    pub identity_hash: String,
    pub args: Value,
    pub kwargs: Value,
    pub result: Value,
    pub created_at: DateTime<Utc>,
    /// What was sent to the provider (`Null` for plain functions).
    pub request_params: Value,
}

/// A consumer of definition and invocation records, usually a persistence layer.
///
/// Writes happen inline with the call, so a failing write fails the call.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        "sink"
    }

    async fn write_definition(&self, record: &DefinitionRecord) -> Result<(), Error>;

    async fn write_invocation(&self, record: &InvocationRecord) -> Result<(), Error>;

    /// Commit buffered writes. Called after each write when the registry is in autocommit mode.
    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// A sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    definitions: Mutex<Vec<DefinitionRecord>>,
    invocations: Mutex<Vec<InvocationRecord>>,
    flushes: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definitions(&self) -> Vec<DefinitionRecord> {
        lock(&self.definitions).clone()
    }

    pub fn invocations(&self) -> Vec<InvocationRecord> {
        lock(&self.invocations).clone()
    }

    /// Invocations recorded for one program.
    pub fn invocations_of(&self, identity_hash: &str) -> Vec<InvocationRecord> {
        lock(&self.invocations)
            .iter()
            .filter(|record| record.identity_hash == identity_hash)
            .cloned()
            .collect()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write_definition(&self, record: &DefinitionRecord) -> Result<(), Error> {
        lock(&self.definitions).push(record.clone());
        Ok(())
    }

    async fn write_invocation(&self, record: &InvocationRecord) -> Result<(), Error> {
        lock(&self.invocations).push(record.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
