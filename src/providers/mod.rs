//! Concrete provider clients.

pub mod openai;

// Re-export commonly used provider types
pub use openai::OpenAIProvider;
