use super::types::{ChatCompletionChunk, ChatCompletionRequest, OpenAIError};
use crate::provider::LLMProvider;
use crate::sse_stream::SseStreamExt;
use crate::{Chunk, CompletionRequest, Error, Response};
use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Streaming client for OpenAI-compatible Chat Completions endpoints.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new(api_key: String) -> Result<Self, Error> {
        Self::new_with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a new provider against a custom base URL (proxies, local servers, mocks).
    pub fn new_with_base_url(api_key: String, base_url: String) -> Result<Self, Error> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn convert_request<'a>(request: &'a CompletionRequest) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            params: &request.params,
        }
    }

    fn parse_chunk(data: &str) -> Option<Result<Chunk, Error>> {
        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(ChatCompletionChunk { error: Some(error), .. }) => {
                let message = format!("stream error: {}", error.message);
                Some(Err(Error::provider("OpenAI", message)))
            }
            Ok(chunk) => Some(Ok(chunk.into())),
            Err(e) => {
                // Keep-alives and vendor extensions are not chunks.
                tracing::debug!(error = %e, "skipping unparseable stream event");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAIProvider {
    async fn stream_completion(&self, request: &CompletionRequest) -> Result<Response, Error> {
        let body = Self::convert_request(request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            let message = serde_json::from_str::<OpenAIError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(Error::provider(
                "OpenAI",
                format!("API error ({status}): {message}"),
            ));
        }

        let chunks = response
            .bytes_stream()
            .sse_events()
            .filter_map(|event| async move {
                match event {
                    Ok(event) if event.is_done() => None,
                    Ok(event) => Self::parse_chunk(&event.data),
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Response::from_stream(chunks))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::new("test-key".to_string()).unwrap();
        assert_eq!(provider.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let base_url = "http://localhost:8080/v1/".to_string();
        let provider = OpenAIProvider::new_with_base_url("k".to_string(), base_url).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_request_conversion() {
        let messages = vec![Message::user("Hello")];
        let request = CompletionRequest::new("gpt-4o-mini", messages, Default::default());
        let body = OpenAIProvider::convert_request(&request);
        assert_eq!(body.model, "gpt-4o-mini");
        assert!(body.stream);
        assert_eq!(body.messages.len(), 1);
    }

    #[test]
    fn test_parse_chunk_skips_garbage() {
        assert!(OpenAIProvider::parse_chunk("not json").is_none());
        let data = r#"{"choices":[{"index":0,"delta":{"content":"Hi"}}]}"#;
        let chunk = OpenAIProvider::parse_chunk(data).unwrap().unwrap();
        assert_eq!(chunk, Chunk::text(0, "Hi"));
    }

    #[test]
    fn test_parse_chunk_surfaces_error_event() {
        let data = r#"{"error":{"message":"The server is overloaded"}}"#;
        let err = OpenAIProvider::parse_chunk(data).unwrap().unwrap_err();
        assert!(
            matches!(err, Error::Provider { ref message, .. } if message.contains("overloaded"))
        );
    }
}
