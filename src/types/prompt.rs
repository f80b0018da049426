use super::message::Message;
use crate::Error;

/// Fallback system prompt used when a text-returning program has no documentation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// What the body of a language-model program produced.
///
/// Text prompts are wrapped into a system + user pair when they are resolved;
/// message sequences are sent verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Text(String),
    Messages(Vec<Message>),
}

impl Prompt {
    /// Resolve this prompt into the messages sent to the provider.
    ///
    /// `doc` is the program's documentation text; it becomes the system message of a
    /// text prompt, falling back to [`DEFAULT_SYSTEM_PROMPT`].
    pub fn into_messages(self, doc: Option<&str>) -> Result<Vec<Message>, Error> {
        match self {
            Prompt::Text(text) => {
                let system = doc
                    .filter(|doc| !doc.trim().is_empty())
                    .unwrap_or(DEFAULT_SYSTEM_PROMPT);
                Ok(vec![Message::system(system), Message::user(text)])
            }
            Prompt::Messages(messages) if messages.is_empty() => Err(Error::InvalidPrompt(
                "expected a prompt string or a non-empty sequence of messages, got an empty \
                 message sequence"
                    .to_string(),
            )),
            Prompt::Messages(messages) => Ok(messages),
        }
    }

    /// Start a message sequence with a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Prompt::Messages(vec![Message::system(content)])
    }

    /// Add a user message.
    pub fn with_user(self, content: impl Into<String>) -> Self {
        self.with_message(Message::user(content))
    }

    /// Add an assistant message.
    pub fn with_assistant(self, content: impl Into<String>) -> Self {
        self.with_message(Message::assistant(content))
    }

    /// Add a message. A text prompt is first turned into a single user message.
    pub fn with_message(self, message: Message) -> Self {
        let mut messages = match self {
            Prompt::Text(text) => vec![Message::user(text)],
            Prompt::Messages(messages) => messages,
        };
        messages.push(message);
        Prompt::Messages(messages)
    }
}

impl From<&str> for Prompt {
    fn from(s: &str) -> Self {
        Prompt::Text(s.to_string())
    }
}

impl From<String> for Prompt {
    fn from(s: String) -> Self {
        Prompt::Text(s)
    }
}

impl From<Message> for Prompt {
    fn from(message: Message) -> Self {
        Prompt::Messages(vec![message])
    }
}

impl From<Vec<Message>> for Prompt {
    fn from(messages: Vec<Message>) -> Self {
        Prompt::Messages(messages)
    }
}
