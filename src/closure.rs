//! Source closures and identity hashes for tracked programs.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

/// Static description of a callable: its name, documentation and source closure inputs.
///
/// This is what a [`ClosureInspector`] looks at to compute identity. The
/// documentation doubles as the system prompt of text-returning programs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionDef {
    pub qualified_name: String,
    pub doc: Option<String>,
    pub source: String,
    /// Source of free functions, constants and types the body depends on.
    pub dependencies: Vec<String>,
    /// Identity hashes of tracked programs called from the body.
    pub uses: BTreeSet<String>,
}

impl FunctionDef {
    pub fn new(qualified_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    #[must_use]
    pub fn dependency(mut self, source: impl Into<String>) -> Self {
        self.dependencies.push(source.into());
        self
    }

    /// Declare a nested program by identity hash.
    #[must_use]
    pub fn uses_identity(mut self, identity_hash: impl Into<String>) -> Self {
        self.uses.insert(identity_hash.into());
        self
    }

    /// Declare a nested tracked program.
    #[must_use]
    pub fn uses<F: crate::track::Invocable>(self, program: &crate::track::Tracked<F>) -> Self {
        let hash = program.identity().hash.clone();
        self.uses_identity(hash)
    }
}

/// The lexical closure of a callable together with its stable hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    pub source: String,
    pub dependencies: Vec<String>,
    pub uses: BTreeSet<String>,
    pub hash: String,
}

/// Computes the closure and identity hash of a callable.
///
/// Implementations must be deterministic for unchanged code and must produce a
/// different hash whenever the callable's transitive source changes.
pub trait ClosureInspector: Send + Sync {
    fn inspect(&self, def: &FunctionDef) -> Closure;
}

/// Hashes the declared documentation, source, dependencies and nested identities with SHA-256.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceClosure;

impl ClosureInspector for SourceClosure {
    fn inspect(&self, def: &FunctionDef) -> Closure {
        let mut hasher = Sha256::new();
        if let Some(doc) = &def.doc {
            hasher.update(doc.as_bytes());
            hasher.update([2u8]);
        }
        hasher.update(def.source.as_bytes());
        for dependency in &def.dependencies {
            hasher.update([0u8]);
            hasher.update(dependency.as_bytes());
        }
        // Nested identities already cover their own closures.
        for used in &def.uses {
            hasher.update([1u8]);
            hasher.update(used.as_bytes());
        }

        Closure {
            source: def.source.clone(),
            dependencies: def.dependencies.clone(),
            uses: def.uses.clone(),
            hash: format!("{:x}", hasher.finalize()),
        }
    }
}
