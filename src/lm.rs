//! Binding prompt functions to a model.
//!
//! [`Lm`] carries the decoration-time configuration (model, parameters,
//! optional client) and turns a prompt function into a tracked language-model
//! program:
//!
//! ```rust,no_run
//! use platformed_lmp::{FunctionDef, Lm};
//!
//! # async fn run() -> Result<(), platformed_lmp::Error> {
//! let hello = Lm::new("gpt-4o-mini")
//!     .param("temperature", 0.2)
//!     .bind(
//!         FunctionDef::new("hello", "fn hello(name: String) -> String").doc("Be terse."),
//!         |name: String| format!("Say hello to {name}"),
//!     );
//!
//! let greeting = hello.call("Sam".to_string()).await?;
//! println!("{greeting}");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::closure::FunctionDef;
use crate::registry::Registry;
use crate::track::{CallOptions, Invocable, Invoked, Tracked};
use crate::{merge_params, Completion, CompletionRequest, Error, LLMProvider, Params, Prompt};

/// Decoration-time configuration for a language-model program.
#[derive(Clone)]
pub struct Lm {
    model: String,
    params: Params,
    client: Option<Arc<dyn LLMProvider>>,
    registry: Option<Registry>,
}

impl fmt::Debug for Lm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lm")
            .field("model", &self.model)
            .field("params", &self.params)
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl Lm {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            params: Params::new(),
            client: None,
            registry: None,
        }
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    /// Always use `client`, bypassing registry resolution.
    #[must_use]
    pub fn client(mut self, client: Arc<dyn LLMProvider>) -> Self {
        self.client = Some(client);
        self
    }

    /// Record and resolve through `registry` instead of the global one.
    #[must_use]
    pub fn registry(mut self, registry: &Registry) -> Self {
        self.registry = Some(registry.clone());
        self
    }

    /// Wrap a prompt function. `def.doc` becomes the system prompt when the
    /// function returns plain text.
    pub fn bind<I, P, F>(self, def: FunctionDef, f: F) -> Tracked<LmBinding<I, P, F>>
    where
        I: Serialize + Send + 'static,
        P: Into<Prompt> + Send + 'static,
        F: Fn(I) -> P + Send + Sync,
    {
        let registry = self.registry.unwrap_or_else(|| Registry::global().clone());
        let binding = LmBinding {
            model: self.model,
            params: self.params,
            client: self.client,
            def,
            f,
            _marker: PhantomData,
        };
        Tracked::new(binding, registry)
    }
}

/// A prompt function bound to a model.
pub struct LmBinding<I, P, F> {
    model: String,
    params: Params,
    client: Option<Arc<dyn LLMProvider>>,
    def: FunctionDef,
    f: F,
    _marker: PhantomData<fn(I) -> P>,
}

impl<I, P, F> LmBinding<I, P, F> {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The undecorated prompt function.
    pub fn function(&self) -> &F {
        &self.f
    }

    fn select_client(
        &self,
        registry: &Registry,
        options: &CallOptions,
    ) -> Result<Arc<dyn LLMProvider>, Error> {
        match options.client.as_ref().or(self.client.as_ref()) {
            Some(client) => Ok(client.clone()),
            None => registry.provider_for(&self.model),
        }
    }
}

#[async_trait::async_trait]
impl<I, P, F> Invocable for LmBinding<I, P, F>
where
    I: Serialize + Send + 'static,
    P: Into<Prompt> + Send + 'static,
    F: Fn(I) -> P + Send + Sync,
{
    type Input = I;
    type Output = Completion;

    fn definition(&self) -> &FunctionDef {
        &self.def
    }

    fn lm_params(&self) -> Option<&Params> {
        Some(&self.params)
    }

    fn is_lmp(&self) -> bool {
        true
    }

    async fn invoke(
        &self,
        registry: &Registry,
        input: I,
        options: CallOptions,
        originator: &str,
    ) -> Result<Invoked<Completion>, Error> {
        let progress = registry.progress();
        let shown_args = if progress.is_some() {
            serde_json::to_value(&input)?
        } else {
            Value::Null
        };

        let prompt: Prompt = (self.f)(input).into();
        let messages = prompt.into_messages(self.def.doc.as_deref())?;
        let params = merge_params([&registry.default_params(), &self.params, &options.params]);
        let request = CompletionRequest::new(self.model.clone(), messages, params);

        let client = self.select_client(registry, &options)?;

        if let Some(observer) = progress.as_deref() {
            observer.on_prompt(&self.def.qualified_name, &shown_args, &request.messages);
            observer.on_start(request.choice_count());
        }

        tracing::debug!(
            lmp = %self.def.qualified_name,
            model = %request.model,
            provider = client.name(),
            "sending completion request"
        );
        let response = client.stream_completion(&request).await?;
        let completion = response.collect(Some(originator), progress.as_deref()).await?;

        if let Some(observer) = progress.as_deref() {
            observer.on_end();
        }

        Ok(Invoked {
            output: completion,
            request: Some(request.to_record()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedProvider;
    use crate::observer::tests::RecordingObserver;
    use crate::sink::MemorySink;
    use crate::{Chunk, Message, Role};
    use serde_json::json;
    use std::collections::HashMap;

    type Hello = Tracked<LmBinding<String, String, fn(String) -> String>>;

    fn say_hello(name: String) -> String {
        format!("Say hello to {name}")
    }

    fn hello(registry: &Registry) -> Hello {
        Lm::new("m").registry(registry).bind(
            FunctionDef::new("hello", "fn hello(name: String) -> String").doc("Be terse."),
            say_hello as fn(String) -> String,
        )
    }

    #[tokio::test]
    async fn test_text_prompt_uses_doc_as_system() {
        let registry = Registry::new();
        let provider = Arc::new(ScriptedProvider::replying("Hello Sam"));
        registry.register("m", provider.clone());

        let out = hello(&registry).call("Sam".to_string()).await.unwrap();
        assert_eq!(out, Completion::Single("Hello Sam".into()));

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].messages,
            vec![Message::system("Be terse."), Message::user("Say hello to Sam")]
        );
    }

    #[tokio::test]
    async fn test_result_carries_originator() {
        let registry = Registry::new();
        registry.register("m", Arc::new(ScriptedProvider::replying("hi")));
        let program = hello(&registry);

        let out = program.call("Sam".to_string()).await.unwrap();
        let single = out.as_single().unwrap();
        assert_eq!(single.originator(), Some(program.identity().hash.as_str()));
    }

    #[tokio::test]
    async fn test_message_prompt_is_sent_verbatim() {
        let registry = Registry::new();
        let provider = Arc::new(ScriptedProvider::replying("ok"));
        registry.register("m", provider.clone());
        let program = Lm::new("m").registry(&registry).bind(
            FunctionDef::new("chat", "fn chat()").doc("ignored"),
            |_: ()| vec![Message::user("just this")],
        );

        program.call(()).await.unwrap();
        let messages = &provider.requests()[0].messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), Role::User);
    }

    #[tokio::test]
    async fn test_empty_message_prompt_fails_before_provider() {
        let registry = Registry::new();
        let provider = Arc::new(ScriptedProvider::replying("ok"));
        registry.register("m", provider.clone());
        let program = Lm::new("m")
            .registry(&registry)
            .bind(FunctionDef::new("empty", "fn empty()"), |_: ()| Vec::<Message>::new());

        let err = program.call(()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPrompt(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_params_merge_call_time_wins() {
        let registry = Registry::new();
        registry.set_default_params(Params::from_iter([
            ("temperature".to_string(), json!(1.0)),
            ("seed".to_string(), json!(7)),
        ]));
        let provider = Arc::new(ScriptedProvider::replying("ok"));
        registry.register("m", provider.clone());
        let program = Lm::new("m")
            .registry(&registry)
            .param("temperature", 0.5)
            .param("max_tokens", 10)
            .bind(FunctionDef::new("p", "fn p()"), |_: ()| "go");

        program
            .call_with((), CallOptions::new().param("max_tokens", 20))
            .await
            .unwrap();

        let params = &provider.requests()[0].params;
        assert_eq!(params["temperature"], json!(0.5));
        assert_eq!(params["max_tokens"], json!(20));
        assert_eq!(params["seed"], json!(7));
    }

    #[tokio::test]
    async fn test_client_precedence() {
        let registry = Registry::new();
        let registered = Arc::new(ScriptedProvider::replying("registered"));
        let bound = Arc::new(ScriptedProvider::replying("bound"));
        let per_call = Arc::new(ScriptedProvider::replying("per-call"));
        registry.register("m", registered.clone());

        let program = Lm::new("m")
            .registry(&registry)
            .client(bound.clone())
            .bind(FunctionDef::new("c", "fn c()"), |_: ()| "go");

        let out = program.call(()).await.unwrap();
        assert_eq!(out.to_string(), "bound");

        let out = program
            .call_with((), CallOptions::new().client(per_call.clone()))
            .await
            .unwrap();
        assert_eq!(out.to_string(), "per-call");
        assert_eq!(registered.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_model_fails_fast() {
        let registry = Registry::new();
        let program = Lm::new("missing")
            .registry(&registry)
            .bind(FunctionDef::new("c", "fn c()"), |_: ()| "go");

        let err = program.call(()).await.unwrap_err();
        assert!(matches!(err, Error::NoProvider { ref model } if model == "missing"));
    }

    #[tokio::test]
    async fn test_scoped_override_routes_call() {
        let registry = Registry::new();
        let base = Arc::new(ScriptedProvider::replying("base"));
        let scoped = Arc::new(ScriptedProvider::replying("scoped"));
        registry.register("m", base.clone());
        let program = hello(&registry);

        let overrides: HashMap<String, Arc<dyn LLMProvider>> =
            HashMap::from([("m".to_string(), scoped.clone() as Arc<dyn LLMProvider>)]);
        let inside = registry
            .scoped_override(overrides, program.call("a".to_string()))
            .await
            .unwrap();
        let outside = program.call("b".to_string()).await.unwrap();

        assert_eq!(inside.to_string(), "scoped");
        assert_eq!(outside.to_string(), "base");
    }

    #[tokio::test]
    async fn test_multiple_choices() {
        let registry = Registry::new();
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_chunks(vec![
            Chunk::text(1, "b"),
            Chunk::text(0, "a"),
            Chunk::text(1, "ar"),
            Chunk::text(0, "b"),
        ]);
        registry.register("m", provider.clone());
        let program = Lm::new("m")
            .registry(&registry)
            .param("n", 2)
            .bind(FunctionDef::new("two", "fn two()"), |_: ()| "go");

        let out = program.call(()).await.unwrap();
        let choices: Vec<&str> = out.choices().iter().map(|c| c.as_str()).collect();
        assert_eq!(choices, vec!["ab", "bar"]);
    }

    #[tokio::test]
    async fn test_records_lmp_definition_and_request() {
        let registry = Registry::new();
        let sink = Arc::new(MemorySink::new());
        registry.add_sink(sink.clone(), false);
        registry.register("m", Arc::new(ScriptedProvider::replying("Hello Sam")));
        let program = Lm::new("m")
            .registry(&registry)
            .param("temperature", 0.1)
            .bind(
                FunctionDef::new("hello", "fn hello(name: String) -> String").doc("Be terse."),
                |name: String| format!("Say hello to {name}"),
            );

        let (_, record) = program
            .call_recorded("Sam".to_string(), CallOptions::new())
            .await
            .unwrap();

        let definition = &sink.definitions()[0];
        assert!(definition.is_lmp);
        assert_eq!(definition.lm_params, Some(json!({"temperature": 0.1})));

        assert_eq!(record.args, json!(["Sam"]));
        assert_eq!(record.result, json!("Hello Sam"));
        assert_eq!(record.request_params["model"], json!("m"));
        assert_eq!(record.request_params["lm_params"], json!({"temperature": 0.1}));
        assert_eq!(record.request_params["messages"][0]["role"], json!("system"));
    }

    #[tokio::test]
    async fn test_verbose_reports_progress() {
        let registry = Registry::new();
        let observer = Arc::new(RecordingObserver::default());
        registry.set_observer(observer.clone());
        registry.set_verbose(true);
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_text("Hi Sam");
        registry.register("m", provider);

        hello(&registry).call("Sam".to_string()).await.unwrap();

        assert_eq!(
            observer.events(),
            vec!["prompt:hello:2", "start:1", "delta:Hi ", "delta:Sam", "end"]
        );
    }

    #[tokio::test]
    async fn test_quiet_registry_reports_nothing() {
        let registry = Registry::new();
        let observer = Arc::new(RecordingObserver::default());
        registry.set_observer(observer.clone());
        registry.register("m", Arc::new(ScriptedProvider::replying("x")));

        hello(&registry).call("Sam".to_string()).await.unwrap();
        assert!(observer.events().is_empty());
    }
}
