use crate::providers::openai::client::DEFAULT_BASE_URL;
use crate::{Error, LLMProvider, OpenAIProvider};
use std::env;
use std::sync::Arc;

/// Configuration for the default provider client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
}

impl ProviderConfig {
    /// Create configuration for the public OpenAI endpoint.
    pub fn openai(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create configuration from environment variables.
    ///
    /// `OPENAI_API_KEY` is required; `OPENAI_BASE_URL` overrides the endpoint.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::config(
                    "OPENAI_API_KEY environment variable is required for the default client",
                )
            })?;

        let config = Self::openai(api_key);
        Ok(match lookup("OPENAI_BASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(base_url) => config.with_base_url(base_url),
            None => config,
        })
    }
}

/// Factory for creating provider clients.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider from configuration.
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn LLMProvider>, Error> {
        let provider =
            OpenAIProvider::new_with_base_url(config.api_key.clone(), config.base_url.clone())?;
        Ok(Arc::new(provider))
    }

    /// Create a provider from environment variables.
    pub fn from_env() -> Result<Arc<dyn LLMProvider>, Error> {
        let config = ProviderConfig::from_env()?;
        Self::create(&config)
    }
}
