use thiserror::Error;

/// Errors that can occur when defining or calling a language-model program.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(
        "No provider configured for model '{model}'. Register a client for model '{model}' with \
         `Registry::register` before use, or pass one through `CallOptions::client`."
    )]
    NoProvider { model: String },

    #[error(
        "Cannot return an invocation record from '{name}': no sink is registered. Add one with \
         `Registry::add_sink` first."
    )]
    SinkRequired { name: String },

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Sink error: {sink} - {message}")]
    Sink { sink: String, message: String },
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }

    pub fn sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Sink {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn no_provider(model: impl Into<String>) -> Self {
        Error::NoProvider {
            model: model.into(),
        }
    }

    /// Whether this error is a configuration problem the caller must fix before retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::NoProvider { .. }
                | Error::SinkRequired { .. }
                | Error::InvalidPrompt(_)
        )
    }
}
