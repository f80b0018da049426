//! Identity tracking and invocation recording for wrapped callables.
//!
//! A [`Tracked`] wrapper gives a callable a stable identity, writes its
//! [`DefinitionRecord`] to the registry's sinks once (after the first call
//! that completes), and writes an [`InvocationRecord`] for every call. With no
//! sink registered, tracking is a pass-through.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::closure::{Closure, FunctionDef};
use crate::registry::Registry;
use crate::sink::{DefinitionRecord, InvocationRecord, Sink};
use crate::{Error, LLMProvider, Params};

/// Per-call options for tracked programs.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Client used for this call instead of registry resolution.
    pub client: Option<Arc<dyn LLMProvider>>,
    /// Request parameters that win over decoration-time parameters.
    pub params: Params,
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .field("params", &self.params)
            .finish()
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn client(mut self, client: Arc<dyn LLMProvider>) -> Self {
        self.client = Some(client);
        self
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
}

/// What one invocation of the underlying callable produced.
#[derive(Debug)]
pub struct Invoked<T> {
    pub output: T,
    /// The provider request that was sent, for language-model programs.
    pub request: Option<Value>,
}

/// A callable that can be wrapped by [`Tracked`].
#[async_trait::async_trait]
pub trait Invocable: Send + Sync {
    type Input: Serialize + Send + 'static;
    type Output: Serialize + Send + 'static;

    fn definition(&self) -> &FunctionDef;

    /// Decoration-time provider parameters, for language-model programs.
    fn lm_params(&self) -> Option<&Params> {
        None
    }

    fn is_lmp(&self) -> bool {
        false
    }

    /// Run the callable. `originator` is the caller's identity hash, used to
    /// tag any [`TrackedStr`](crate::TrackedStr) the call produces.
    async fn invoke(
        &self,
        registry: &Registry,
        input: Self::Input,
        options: CallOptions,
        originator: &str,
    ) -> Result<Invoked<Self::Output>, Error>;
}

/// A callable with a stable identity whose calls are recorded to sinks.
pub struct Tracked<F: Invocable> {
    inner: F,
    registry: Registry,
    created_at: DateTime<Utc>,
    identity: OnceLock<Closure>,
    /// Initialized once a definition record reached every sink.
    serialized: OnceCell<()>,
}

impl<F: Invocable> fmt::Debug for Tracked<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("name", &self.name())
            .field("identity", &self.identity.get().map(|c| &c.hash))
            .field("created_at", &self.created_at)
            .field("has_serialized", &self.has_serialized())
            .finish()
    }
}

impl<F: Invocable> Tracked<F> {
    /// Wrap `inner`, recording through `registry`.
    pub fn new(inner: F, registry: Registry) -> Self {
        Self {
            inner,
            registry,
            created_at: Utc::now(),
            identity: OnceLock::new(),
            serialized: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.definition().qualified_name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The closure and identity hash, computed on first use and cached.
    pub fn identity(&self) -> &Closure {
        self.identity
            .get_or_init(|| self.registry.inspector().inspect(self.inner.definition()))
    }

    pub fn has_serialized(&self) -> bool {
        self.serialized.initialized()
    }

    /// The undecorated callable.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn call(&self, input: F::Input) -> Result<F::Output, Error> {
        self.call_with(input, CallOptions::default()).await
    }

    pub async fn call_with(
        &self,
        input: F::Input,
        options: CallOptions,
    ) -> Result<F::Output, Error> {
        let (output, _) = self.run(input, options, false).await?;
        Ok(output)
    }

    /// Call and also return the invocation record written to the sinks.
    ///
    /// Fails with [`Error::SinkRequired`] before doing any work when no sink is registered.
    pub async fn call_recorded(
        &self,
        input: F::Input,
        options: CallOptions,
    ) -> Result<(F::Output, InvocationRecord), Error> {
        let (output, record) = self.run(input, options, true).await?;
        let record = record.ok_or_else(|| Error::SinkRequired {
            name: self.name().to_string(),
        })?;
        Ok((output, record))
    }

    async fn run(
        &self,
        input: F::Input,
        options: CallOptions,
        want_record: bool,
    ) -> Result<(F::Output, Option<InvocationRecord>), Error> {
        let sinks = self.registry.sinks();
        if want_record && sinks.is_empty() {
            return Err(Error::SinkRequired {
                name: self.name().to_string(),
            });
        }

        let identity = self.identity();
        let recorded_args = if sinks.is_empty() {
            None
        } else {
            Some(split_args(serde_json::to_value(&input)?))
        };

        let invoked = self
            .inner
            .invoke(&self.registry, input, options, &identity.hash)
            .await?;

        let Some((args, kwargs)) = recorded_args else {
            return Ok((invoked.output, None));
        };

        self.write_definition(&sinks).await?;

        let record = InvocationRecord {
            id: Uuid::new_v4(),
            identity_hash: identity.hash.clone(),
            args,
            kwargs,
            result: serde_json::to_value(&invoked.output)?,
            created_at: Utc::now(),
            request_params: invoked.request.unwrap_or(Value::Null),
        };
        let autocommit = self.registry.autocommit();
        for sink in &sinks {
            sink.write_invocation(&record).await?;
            if autocommit {
                sink.flush().await?;
            }
        }
        tracing::debug!(lmp = self.name(), id = %record.id, "wrote invocation");

        Ok((invoked.output, want_record.then_some(record)))
    }

    /// Write the definition record once. Concurrent first calls wait for the
    /// single writer; a failed write leaves the cell empty for the next call.
    async fn write_definition(&self, sinks: &[Arc<dyn Sink>]) -> Result<(), Error> {
        self.serialized
            .get_or_try_init(|| async {
                let closure = self.identity();
                let record = DefinitionRecord {
                    identity_hash: closure.hash.clone(),
                    qualified_name: self.name().to_string(),
                    source_text: closure.source.clone(),
                    dependencies: closure.dependencies.clone(),
                    created_at: self.created_at,
                    is_lmp: self.inner.is_lmp(),
                    lm_params: self
                        .inner
                        .lm_params()
                        .filter(|params| !params.is_empty())
                        .map(|params| Value::Object(params.clone())),
                    uses: closure.uses.clone(),
                };

                let autocommit = self.registry.autocommit();
                for sink in sinks {
                    sink.write_definition(&record).await?;
                    if autocommit {
                        sink.flush().await?;
                    }
                }
                tracing::debug!(
                    lmp = self.name(),
                    identity = %record.identity_hash,
                    "wrote definition"
                );
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }
}

/// Split a serialized input into positional and named arguments.
///
/// Structs and maps become keyword arguments, tuples and sequences positional
/// ones, `()` no arguments, and any other value a single positional argument.
fn split_args(value: Value) -> (Value, Value) {
    match value {
        Value::Object(map) => (Value::Array(Vec::new()), Value::Object(map)),
        Value::Array(items) => (Value::Array(items), Value::Object(Map::new())),
        Value::Null => (Value::Array(Vec::new()), Value::Object(Map::new())),
        other => (Value::Array(vec![other]), Value::Object(Map::new())),
    }
}

/// A plain (non language-model) function made trackable.
pub struct FnInvocable<I, O, F> {
    def: FunctionDef,
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O, F> FnInvocable<I, O, F> {
    pub fn new(def: FunctionDef, f: F) -> Self {
        Self {
            def,
            f,
            _marker: PhantomData,
        }
    }

    pub fn function(&self) -> &F {
        &self.f
    }
}

#[async_trait::async_trait]
impl<I, O, F> Invocable for FnInvocable<I, O, F>
where
    I: Serialize + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(I) -> Result<O, Error> + Send + Sync,
{
    type Input = I;
    type Output = O;

    fn definition(&self) -> &FunctionDef {
        &self.def
    }

    async fn invoke(
        &self,
        _registry: &Registry,
        input: I,
        _options: CallOptions,
        _originator: &str,
    ) -> Result<Invoked<O>, Error> {
        Ok(Invoked {
            output: (self.f)(input)?,
            request: None,
        })
    }
}

/// Track a plain function through the global registry.
pub fn track<I, O, F>(def: FunctionDef, f: F) -> Tracked<FnInvocable<I, O, F>>
where
    I: Serialize + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(I) -> Result<O, Error> + Send + Sync,
{
    track_in(Registry::global(), def, f)
}

/// Track a plain function through `registry`.
pub fn track_in<I, O, F>(
    registry: &Registry,
    def: FunctionDef,
    f: F,
) -> Tracked<FnInvocable<I, O, F>>
where
    I: Serialize + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(I) -> Result<O, Error> + Send + Sync,
{
    Tracked::new(FnInvocable::new(def, f), registry.clone())
}
