//! Language-model programs with tracked identity.
//!
//! A language-model program (LMP) is a prompt function bound to a model with
//! [`Lm::bind`]. Calling it builds the prompt, streams a completion from the
//! provider resolved through a [`Registry`], and aggregates every streamed
//! choice into a [`Completion`] of [`TrackedStr`]s tagged with the program's
//! identity hash. When sinks are registered, each program's definition is
//! recorded once and every call is recorded as an [`InvocationRecord`].
//!
//! Plain functions can be tracked the same way with [`track`].

pub mod error;
pub mod types;
pub mod provider;
pub mod providers;
pub mod response;
pub mod sse_stream;
pub mod accumulator;
pub mod factory;
pub mod tracked;
pub mod observer;
pub mod registry;
pub mod sink;
pub mod closure;
pub mod track;
pub mod lm;
pub mod mock;

// Re-export core types for easy usage
pub use error::Error;
pub use types::*;
pub use provider::LLMProvider;
pub use providers::*;
pub use response::*;
pub use sse_stream::SseEvent;
pub use accumulator::*;
pub use factory::{ProviderConfig, ProviderFactory};
pub use tracked::{Completion, TrackedStr};
pub use observer::{ProgressObserver, TracingObserver};
pub use registry::{Overrides, Registry};
pub use sink::{DefinitionRecord, InvocationRecord, MemorySink, Sink};
pub use closure::{Closure, ClosureInspector, FunctionDef, SourceClosure};
pub use track::{track, track_in, CallOptions, FnInvocable, Invocable, Invoked, Tracked};
pub use lm::{Lm, LmBinding};
