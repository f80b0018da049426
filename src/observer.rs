//! Live progress reporting for verbose mode.

use serde_json::Value;

use crate::types::Message;

/// Receives progress events while a program runs in verbose mode.
///
/// Events are a pure side channel: nothing an observer does can change the
/// finalized values of a call.
pub trait ProgressObserver: Send + Sync {
    /// The program `name` is about to send `messages`.
    fn on_prompt(&self, _name: &str, _args: &Value, _messages: &[Message]) {}

    /// Streaming started for `choices` parallel completions.
    fn on_start(&self, _choices: u64) {}

    /// A text fragment for choice 0 arrived.
    fn on_delta(&self, _fragment: &str) {}

    /// The stream was exhausted.
    fn on_end(&self) {}
}

/// Reports progress as `tracing` events on the `platformed_lmp::progress` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_prompt(&self, name: &str, args: &Value, messages: &[Message]) {
        tracing::info!(target: "platformed_lmp::progress", lmp = name, %args, "invoking");
        for message in messages {
            tracing::info!(
                target: "platformed_lmp::progress",
                role = message.role.as_str(),
                content = %message.content,
                "prompt"
            );
        }
    }

    fn on_start(&self, choices: u64) {
        tracing::info!(target: "platformed_lmp::progress", choices, "streaming");
    }

    fn on_delta(&self, fragment: &str) {
        tracing::info!(target: "platformed_lmp::progress", fragment, "delta");
    }

    fn on_end(&self) {
        tracing::info!(target: "platformed_lmp::progress", "done");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Observer that records every event it sees.
    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub(crate) events: Mutex<Vec<String>>,
    }

    impl ProgressObserver for RecordingObserver {
        fn on_prompt(&self, name: &str, _args: &Value, messages: &[Message]) {
            self.push(format!("prompt:{name}:{}", messages.len()));
        }

        fn on_start(&self, choices: u64) {
            self.push(format!("start:{choices}"));
        }

        fn on_delta(&self, fragment: &str) {
            self.push(format!("delta:{fragment}"));
        }

        fn on_end(&self) {
            self.push("end".to_string());
        }
    }

    impl RecordingObserver {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        pub(crate) fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_default_methods_are_noops() {
        struct Silent;
        impl ProgressObserver for Silent {}

        let observer = Silent;
        observer.on_start(2);
        observer.on_delta("x");
        observer.on_end();
    }

    #[test]
    fn test_tracing_observer_accepts_all_events() {
        let observer = TracingObserver;
        observer.on_prompt("greet", &serde_json::json!(["Sam"]), &[Message::user("Hi")]);
        observer.on_start(1);
        observer.on_delta("He");
        observer.on_end();
    }
}
