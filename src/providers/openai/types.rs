use serde::{Deserialize, Serialize};

use crate::types::{ChoiceDelta, Chunk, Message, Params};

/// Chat Completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
    #[serde(flatten)]
    pub params: &'a Params,
}

/// One streamed `chat.completion.chunk` object.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Set when the server aborts the stream with an error event.
    #[serde(default)]
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    pub index: usize,
    #[serde(default)]
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    pub role: Option<String>,
    pub content: Option<String>,
}

impl From<ChatCompletionChunk> for Chunk {
    fn from(chunk: ChatCompletionChunk) -> Self {
        Chunk::new(
            chunk
                .choices
                .into_iter()
                .map(|choice| ChoiceDelta {
                    index: choice.index,
                    content: choice.delta.content,
                })
                .collect(),
        )
    }
}

/// OpenAI error response.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIError {
    pub error: ErrorDetails,
}

/// Error details from OpenAI API.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}
