use crate::{CompletionRequest, Error, Response};

/// A client that streams chat completions from a language-model provider.
///
/// Every request is streamed: the returned [`Response`] yields [`Chunk`](crate::Chunk)s
/// in arrival order, each carrying per-choice text deltas.
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync + 'static {
    /// Open a streamed completion for `request`.
    async fn stream_completion(&self, request: &CompletionRequest) -> Result<Response, Error>;

    /// Short provider name used in logs and error messages.
    fn name(&self) -> &str {
        "provider"
    }
}
