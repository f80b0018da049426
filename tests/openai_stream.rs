use platformed_lmp::{
    CompletionRequest, Error, FunctionDef, LLMProvider, Lm, MemorySink, Message, OpenAIProvider,
    Params, Registry,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(events: &[serde_json::Value]) -> String {
    let mut body: String = events.iter().map(|event| format!("data: {event}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn delta(index: usize, content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "model": "gpt-4o-mini",
        "choices": [{"index": index, "delta": {"content": content}, "finish_reason": null}]
    })
}

fn provider(server: &MockServer) -> OpenAIProvider {
    OpenAIProvider::new_with_base_url("test-api-key".to_string(), server.uri())
        .expect("Failed to create OpenAI provider")
}

#[tokio::test]
async fn test_streamed_chat_completion() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"choices": [{
            "index": 0,
            "delta": {"role": "assistant", "content": ""},
            "finish_reason": null
        }]}),
        delta(0, "Paris"),
        delta(0, " is the capital."),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
    ]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "stream": true,
            "temperature": 0.2,
            "messages": [{"role": "user", "content": "Capital of France?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = Params::new();
    params.insert("temperature".to_string(), json!(0.2));
    let messages = vec![Message::user("Capital of France?")];
    let request = CompletionRequest::new("gpt-4o-mini", messages, params);

    let response = provider(&server).stream_completion(&request).await.unwrap();
    let completion = response.collect(Some("origin"), None).await.unwrap();
    assert_eq!(completion.to_string(), "Paris is the capital.");
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("hi")], Params::new());
    let err = provider(&server).stream_completion(&request).await.unwrap_err();
    match err {
        Error::Provider { provider, message } => {
            assert_eq!(provider, "OpenAI");
            assert!(message.contains("401"));
            assert!(message.contains("Incorrect API key provided"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_lmp_over_http_with_multiple_choices() {
    let server = MockServer::start().await;
    let body = sse(&[delta(1, "b"), delta(0, "Hel"), delta(1, "ar"), delta(0, "lo")]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"n": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let registry = Registry::new();
    let sink = Arc::new(MemorySink::new());
    registry.add_sink(sink.clone(), false);
    registry.register("gpt-4o-mini", Arc::new(provider(&server)));

    let pair = Lm::new("gpt-4o-mini")
        .registry(&registry)
        .param("n", 2)
        .bind(
            FunctionDef::new("pair", "fn pair(topic: String) -> String").doc("Answer in one word."),
            |topic: String| format!("A word about {topic}"),
        );

    let out = pair.call("greetings".to_string()).await.unwrap();
    assert_eq!(out.choices(), &["Hello", "bar"]);

    let record = &sink.invocations()[0];
    assert_eq!(record.result, json!(["Hello", "bar"]));
    assert_eq!(record.request_params["lm_params"], json!({"n": 2}));
}

#[tokio::test]
async fn test_error_event_mid_stream_fails_the_call() {
    let server = MockServer::start().await;
    let body = sse(&[
        delta(0, "par"),
        json!({"error": {"message": "The server is overloaded", "type": "server_error"}}),
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let registry = Registry::new();
    let sink = Arc::new(MemorySink::new());
    registry.add_sink(sink.clone(), false);
    registry.register("gpt-4o-mini", Arc::new(provider(&server)));
    let word = Lm::new("gpt-4o-mini")
        .registry(&registry)
        .bind(FunctionDef::new("word", "fn word() -> String"), |_: ()| "One word.");

    let err = word.call(()).await.unwrap_err();
    match err {
        Error::Provider { provider, message } => {
            assert_eq!(provider, "OpenAI");
            assert!(message.contains("The server is overloaded"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
    assert!(sink.invocations().is_empty());
    assert!(sink.definitions().is_empty());
    assert!(!word.has_serialized());
}
