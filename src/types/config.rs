use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::Message;

/// Free-form provider parameters (`temperature`, `max_tokens`, `n`, ...).
pub type Params = Map<String, Value>;

/// Merge parameter layers; later layers win on key collision.
///
/// Layers are applied in the order given, so callers pass
/// library defaults, then decoration-time parameters, then call-time parameters.
pub fn merge_params<'a, I>(layers: I) -> Params
where
    I: IntoIterator<Item = &'a Params>,
{
    let mut merged = Params::new();
    for layer in layers {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Request handed to a provider client.
///
/// Requests are always streamed; `params` is flattened next to the model and messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub params: Params,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, params: Params) -> Self {
        Self {
            model: model.into(),
            messages,
            params,
        }
    }

    /// Number of parallel completions requested (`n`, default 1).
    pub fn choice_count(&self) -> u64 {
        self.params.get("n").and_then(Value::as_u64).unwrap_or(1)
    }

    /// The record of what was sent, as stored on invocation records.
    pub fn to_record(&self) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": self.messages,
            "lm_params": self.params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_later_layers_win() {
        let defaults = params(json!({"temperature": 1.0, "n": 1}));
        let decorated = params(json!({"temperature": 0.5, "max_tokens": 100}));
        let call = params(json!({"temperature": 0.1}));

        let merged = merge_params([&defaults, &decorated, &call]);
        assert_eq!(merged["temperature"], json!(0.1));
        assert_eq!(merged["max_tokens"], json!(100));
        assert_eq!(merged["n"], json!(1));
    }

    #[test]
    fn test_request_serializes_params_flat() {
        let request = CompletionRequest::new(
            "gpt-4o-mini",
            vec![Message::user("Hi")],
            params(json!({"n": 2})),
        );
        assert_eq!(request.choice_count(), 2);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["n"], json!(2));
        assert_eq!(body["model"], json!("gpt-4o-mini"));
    }

    #[test]
    fn test_record_keeps_merged_params() {
        let request = CompletionRequest::new("m", vec![Message::user("Hi")], Params::new());
        let record = request.to_record();
        assert_eq!(record["model"], json!("m"));
        assert_eq!(record["messages"][0]["role"], json!("user"));
        assert_eq!(record["lm_params"], json!({}));
    }
}
