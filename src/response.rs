//! Streamed provider responses.

use crate::accumulator::ChoiceAccumulator;
use crate::observer::ProgressObserver;
use crate::{Chunk, Completion, Error};
use futures_util::stream::Stream;
use std::pin::Pin;

/// Boxed stream of chunks produced by a provider.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, Error>> + Send>>;

/// A streamed response from a provider.
pub struct Response {
    stream: ChunkStream,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response").finish_non_exhaustive()
    }
}

impl Response {
    /// Create a new response from a stream of chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Chunk, Error>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Create a response that replays already-known chunks.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self::from_stream(futures_util::stream::iter(chunks.into_iter().map(Ok)))
    }

    /// Consume the stream and finalize every choice.
    ///
    /// `originator` tags the finalized strings. When `observer` is set, choice-0
    /// fragments are forwarded to it as they arrive. A stream error aborts the
    /// collection and nothing is finalized.
    pub async fn collect(
        self,
        originator: Option<&str>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<Completion, Error> {
        use futures_util::StreamExt;

        let mut stream = self.stream;
        let mut accumulator = ChoiceAccumulator::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            tracing::trace!(deltas = chunk.choices.len(), "chunk");
            accumulator.process_chunk(chunk, observer);
        }

        Ok(accumulator.finalize(originator))
    }

    /// Get the raw chunk stream.
    pub fn stream(self) -> ChunkStream {
        self.stream
    }
}
