//! Model → provider registry with context-local overrides.
//!
//! A [`Registry`] holds the process-wide configuration a tracked program needs
//! at call time: which provider serves which model, which sinks receive
//! records, and whether progress is reported.
//!
//! Overrides are scoped to the running task (or thread, for synchronous code):
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use platformed_lmp::{Registry, LLMProvider, Overrides};
//! # async fn example(staging: Arc<dyn LLMProvider>) {
//! let registry = Registry::new();
//! let overrides = Overrides::from([("gpt-4o-mini".to_string(), staging)]);
//! registry
//!     .scoped_override(overrides, async {
//!         // calls made here resolve "gpt-4o-mini" to the staging client
//!     })
//!     .await;
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::closure::{ClosureInspector, SourceClosure};
use crate::factory::{ProviderConfig, ProviderFactory};
use crate::observer::{ProgressObserver, TracingObserver};
use crate::sink::Sink;
use crate::{Error, LLMProvider, Params};

/// A model name → provider client mapping.
pub type Overrides = HashMap<String, Arc<dyn LLMProvider>>;

tokio::task_local! {
    /// Override frames active in the current task, innermost last.
    static OVERRIDES: OverrideStack;
}

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Default)]
struct OverrideStack {
    frames: Vec<Frame>,
}

#[derive(Clone)]
struct Frame {
    registry: u64,
    generation: u64,
    models: Arc<Overrides>,
}

impl OverrideStack {
    fn current() -> Self {
        OVERRIDES.try_with(|stack| stack.clone()).unwrap_or_default()
    }

    /// Innermost frame of `registry` that is still valid for `generation`.
    fn top_for(&self, registry: u64, generation: u64) -> Option<&Frame> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.registry == registry)
            .filter(|frame| frame.generation == generation)
    }
}

struct State {
    models: Overrides,
    sinks: Vec<Arc<dyn Sink>>,
    autocommit: bool,
    verbose: bool,
    default_params: Params,
    fallback: Option<Arc<dyn LLMProvider>>,
    observer: Arc<dyn ProgressObserver>,
    inspector: Arc<dyn ClosureInspector>,
    /// Bumped by `reset`; frames from older generations are ignored.
    generation: u64,
}

impl State {
    fn initial(generation: u64) -> Self {
        Self {
            models: Overrides::new(),
            sinks: Vec::new(),
            autocommit: false,
            verbose: false,
            default_params: Params::new(),
            fallback: None,
            observer: Arc::new(TracingObserver),
            inspector: Arc::new(SourceClosure),
            generation,
        }
    }
}

struct Inner {
    id: u64,
    state: Mutex<State>,
}

/// Shared handle to a provider registry and its sinks.
///
/// Cloning is cheap and every clone sees the same state. All mutations go
/// through a single lock; override frames live outside it, in the calling
/// task or thread.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        let mut models: Vec<_> = state.models.keys().collect();
        models.sort();
        f.debug_struct("Registry")
            .field("id", &self.inner.id)
            .field("models", &models)
            .field("sinks", &state.sinks.len())
            .field("autocommit", &state.autocommit)
            .field("verbose", &state.verbose)
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(State::initial(0)),
            }),
        }
    }

    /// The process-wide default registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Creates a registry configured from environment variables.
    ///
    /// `LMP_VERBOSE` turns on progress reporting. When OpenAI credentials are
    /// present, the environment client becomes the fallback provider.
    pub fn from_env() -> Self {
        let registry = Self::new();
        registry.set_verbose(env_flag("LMP_VERBOSE"));

        match ProviderConfig::from_env().and_then(|config| ProviderFactory::create(&config)) {
            Ok(provider) => registry.set_fallback(provider),
            Err(e) => tracing::debug!(error = %e, "no fallback provider from environment"),
        }
        registry
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register (or replace) the client for `model` in the base mapping.
    pub fn register(&self, model: impl Into<String>, client: Arc<dyn LLMProvider>) {
        self.state().models.insert(model.into(), client);
    }

    /// Resolve the client for `model` in the calling context.
    ///
    /// The innermost active override frame wins; without one the base mapping
    /// is used. Absence is not an error here.
    pub fn resolve(&self, model: &str) -> Option<Arc<dyn LLMProvider>> {
        let stack = OverrideStack::current();
        let state = self.state();
        match stack.top_for(self.inner.id, state.generation) {
            Some(frame) => frame.models.get(model).cloned(),
            None => state.models.get(model).cloned(),
        }
    }

    /// Resolve `model`, falling back to the registry's default client.
    ///
    /// Fails with [`Error::NoProvider`] when neither exists.
    pub fn provider_for(&self, model: &str) -> Result<Arc<dyn LLMProvider>, Error> {
        if let Some(client) = self.resolve(model) {
            return Ok(client);
        }
        match self.fallback() {
            Some(fallback) => {
                tracing::warn!(
                    model,
                    fallback = fallback.name(),
                    "model is not registered, falling back to the default client"
                );
                Ok(fallback)
            }
            None => Err(Error::no_provider(model)),
        }
    }

    /// The mapping effective in the calling context.
    pub fn effective_models(&self) -> Overrides {
        let stack = OverrideStack::current();
        let state = self.state();
        match stack.top_for(self.inner.id, state.generation) {
            Some(frame) => frame.models.as_ref().clone(),
            None => state.models.clone(),
        }
    }

    /// Build the stack the scoped code will see: the current frames plus one
    /// holding the effective mapping merged with `overrides`.
    fn push_frame(&self, overrides: Overrides) -> OverrideStack {
        let mut stack = OverrideStack::current();
        let frame = {
            // Copy under the lock so a concurrent `register` is either fully in or out.
            let state = self.state();
            let mut models = match stack.top_for(self.inner.id, state.generation) {
                Some(frame) => frame.models.as_ref().clone(),
                None => state.models.clone(),
            };
            models.extend(overrides);
            Frame {
                registry: self.inner.id,
                generation: state.generation,
                models: Arc::new(models),
            }
        };
        stack.frames.push(frame);
        stack
    }

    /// Run `fut` with `overrides` layered over the current mapping.
    ///
    /// The mapping is copied when the returned future is first polled, in the
    /// task polling it. The override is visible only inside `fut`, in this
    /// task. It is released when `fut` completes, fails, panics or is dropped;
    /// the base mapping is never touched. Tasks spawned from inside `fut` do
    /// not inherit it.
    pub fn scoped_override<F>(
        &self,
        overrides: Overrides,
        fut: F,
    ) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let registry = self.clone();
        async move { OVERRIDES.scope(registry.push_frame(overrides), fut).await }
    }

    /// Synchronous form of [`scoped_override`](Self::scoped_override), scoped to
    /// the current thread for the duration of `f`.
    pub fn scoped_override_sync<R>(&self, overrides: Overrides, f: impl FnOnce() -> R) -> R {
        OVERRIDES.sync_scope(self.push_frame(overrides), f)
    }

    /// Add a sink. Autocommit stays on once any sink asked for it.
    pub fn add_sink(&self, sink: Arc<dyn Sink>, autocommit: bool) {
        let mut state = self.state();
        let exists = state
            .sinks
            .iter()
            .any(|s| Arc::as_ptr(s) as *const () == Arc::as_ptr(&sink) as *const ());
        if !exists {
            state.sinks.push(sink);
        }
        state.autocommit = autocommit || state.autocommit;
    }

    pub fn has_sinks(&self) -> bool {
        !self.state().sinks.is_empty()
    }

    /// Snapshot of the registered sinks.
    pub fn sinks(&self) -> Vec<Arc<dyn Sink>> {
        self.state().sinks.clone()
    }

    pub fn autocommit(&self) -> bool {
        self.state().autocommit
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.state().verbose = verbose;
    }

    pub fn verbose(&self) -> bool {
        self.state().verbose
    }

    pub fn set_observer(&self, observer: Arc<dyn ProgressObserver>) {
        self.state().observer = observer;
    }

    /// The progress observer, only when verbose mode is on.
    pub fn progress(&self) -> Option<Arc<dyn ProgressObserver>> {
        let state = self.state();
        state.verbose.then(|| state.observer.clone())
    }

    /// Set the client used when a model has no registered client.
    pub fn set_fallback(&self, client: Arc<dyn LLMProvider>) {
        self.state().fallback = Some(client);
    }

    pub fn fallback(&self) -> Option<Arc<dyn LLMProvider>> {
        self.state().fallback.clone()
    }

    /// Set the library-wide default request parameters.
    pub fn set_default_params(&self, params: Params) {
        self.state().default_params = params;
    }

    pub fn default_params(&self) -> Params {
        self.state().default_params.clone()
    }

    pub fn set_inspector(&self, inspector: Arc<dyn ClosureInspector>) {
        self.state().inspector = inspector;
    }

    pub fn inspector(&self) -> Arc<dyn ClosureInspector> {
        self.state().inspector.clone()
    }

    /// Restore the initial configuration.
    ///
    /// Override frames taken before the reset stop applying in every context.
    pub fn reset(&self) {
        let mut state = self.state();
        let generation = state.generation + 1;
        *state = State::initial(generation);
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
