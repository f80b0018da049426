//! Delta accumulation logic for streaming responses.

use std::collections::BTreeMap;

use crate::observer::ProgressObserver;
use crate::types::{ChoiceDelta, Chunk};
use crate::{Completion, TrackedStr};

/// Accumulates streamed per-choice deltas into finalized completions.
///
/// Deltas are grouped by choice index in arrival order. The map is keyed by
/// index, so finalization is ordered by index no matter how the provider
/// interleaved the choices.
#[derive(Debug, Default)]
pub struct ChoiceAccumulator {
    choices: BTreeMap<usize, Vec<ChoiceDelta>>,
}

impl ChoiceAccumulator {
    /// Create a new accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every delta of `chunk`.
    ///
    /// Fragments of choice 0 are forwarded to `observer` as they arrive; this is
    /// the only place unfinalized text leaves the accumulator.
    pub fn process_chunk(&mut self, chunk: Chunk, observer: Option<&dyn ProgressObserver>) {
        for delta in chunk.choices {
            if let (Some(observer), 0) = (observer, delta.index) {
                observer.on_delta(delta.fragment());
            }
            self.choices.entry(delta.index).or_default().push(delta);
        }
    }

    /// Number of distinct choice indices seen so far.
    pub fn choice_count(&self) -> usize {
        self.choices.len()
    }

    /// The text accumulated so far for one choice.
    pub fn current_text(&self, index: usize) -> Option<String> {
        self.choices.get(&index).map(|deltas| concat(deltas))
    }

    /// Finalize every choice, tagging each string with `originator`.
    ///
    /// Exactly one observed choice yields [`Completion::Single`]; otherwise the
    /// choices come back in ascending index order.
    pub fn finalize(self, originator: Option<&str>) -> Completion {
        let mut finalized: Vec<TrackedStr> = self
            .choices
            .values()
            .map(|deltas| TrackedStr::new(concat(deltas), originator.map(str::to_string)))
            .collect();

        if finalized.len() == 1 {
            if let Some(only) = finalized.pop() {
                return Completion::Single(only);
            }
        }
        Completion::Multiple(finalized)
    }
}

fn concat(deltas: &[ChoiceDelta]) -> String {
    deltas.iter().map(ChoiceDelta::fragment).collect()
}
