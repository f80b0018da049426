//! Scripted provider for tests.
//!
//! [`ScriptedProvider`] replays queued chunk sequences instead of talking to a
//! network, and records every request it receives.
//!
//! ```rust
//! use platformed_lmp::mock::ScriptedProvider;
//! use platformed_lmp::Chunk;
//!
//! let provider = ScriptedProvider::new();
//! provider.queue_chunks(vec![Chunk::text(0, "Hel"), Chunk::text(0, "lo")]);
//! provider.queue_failure("rate limited");
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::provider::LLMProvider;
use crate::{Chunk, CompletionRequest, Error, Response};

#[derive(Debug, Clone)]
enum Script {
    Chunks(Vec<Chunk>),
    /// Yield the chunks, then fail mid-stream.
    Interrupted(Vec<Chunk>, String),
    /// Fail before the stream opens.
    Failure(String),
}

/// A queue-based fake provider.
///
/// Each call pops the next script; once the queue is empty the fallback reply
/// (if any) is replayed for every further call.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    name: String,
    scripts: Mutex<VecDeque<Script>>,
    fallback: Option<Vec<Chunk>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::named("scripted")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A provider that answers every call with `text` as a single choice.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(vec![Chunk::text(0, text)]),
            ..Self::new()
        }
    }

    pub fn queue_chunks(&self, chunks: Vec<Chunk>) {
        lock(&self.scripts).push_back(Script::Chunks(chunks));
    }

    /// Queue a single-choice reply streamed word by word.
    pub fn queue_text(&self, text: &str) {
        let chunks = text
            .split_inclusive(' ')
            .map(|word| Chunk::text(0, word))
            .collect();
        self.queue_chunks(chunks);
    }

    /// Queue a stream that breaks after yielding `chunks`.
    pub fn queue_interrupted(&self, chunks: Vec<Chunk>, message: impl Into<String>) {
        lock(&self.scripts).push_back(Script::Interrupted(chunks, message.into()));
    }

    /// Queue a call that fails before streaming.
    pub fn queue_failure(&self, message: impl Into<String>) {
        lock(&self.scripts).push_back(Script::Failure(message.into()));
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait::async_trait]
impl LLMProvider for ScriptedProvider {
    async fn stream_completion(&self, request: &CompletionRequest) -> Result<Response, Error> {
        lock(&self.requests).push(request.clone());

        let script = lock(&self.scripts)
            .pop_front()
            .or_else(|| self.fallback.clone().map(Script::Chunks));

        match script {
            Some(Script::Chunks(chunks)) => Ok(Response::from_chunks(chunks)),
            Some(Script::Interrupted(chunks, message)) => {
                let items: Vec<Result<Chunk, Error>> = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(Error::streaming(message))))
                    .collect();
                Ok(Response::from_stream(futures::stream::iter(items)))
            }
            Some(Script::Failure(message)) => Err(Error::provider(&self.name, message)),
            None => Err(Error::provider(
                &self.name,
                format!("no scripted response left for model '{}'", request.model),
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
